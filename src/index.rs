/// Contiguous run of bars sharing one calendar date.
///
/// Bars keep their file order, so the same date may show up in more than one
/// run when the source file is not sorted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DayRun {
    pub date: chrono::NaiveDate,
    pub start_index: u64,
    pub end_index: u64, // inclusive
}

/// Incrementally builds the day-run index while bars are appended.
#[derive(Debug, Default)]
pub struct DayRunBuilder {
    runs: Vec<DayRun>,
    current: Option<(chrono::NaiveDate, u64)>,
    next_index: u64,
}

impl DayRunBuilder {
    pub fn push(&mut self, date: chrono::NaiveDate) {
        match self.current {
            Some((day, _)) if day == date => {}
            Some((day, start)) => {
                self.runs.push(DayRun {
                    date: day,
                    start_index: start,
                    end_index: self.next_index - 1,
                });
                self.current = Some((date, self.next_index));
            }
            None => self.current = Some((date, self.next_index)),
        }
        self.next_index += 1;
    }

    pub fn finish(mut self) -> Vec<DayRun> {
        // last day
        if let Some((day, start)) = self.current.take() {
            self.runs.push(DayRun {
                date: day,
                start_index: start,
                end_index: self.next_index - 1,
            });
        }
        self.runs
    }
}

/// Checks that runs tile `0..len` exactly, in order, without gaps.
pub fn runs_cover(runs: &[DayRun], len: usize) -> bool {
    let mut expected = 0u64;
    for run in runs {
        if run.start_index != expected || run.end_index < run.start_index {
            return false;
        }
        expected = run.end_index + 1;
    }
    expected == len as u64
}
