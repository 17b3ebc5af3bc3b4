use crate::shared::DisplayState;

// state local to tui: where the cursor is and which pitch `n` writes.
// everything else comes from DisplayState each frame
#[derive(Clone, Debug)]
pub struct TuiState {
    pub row: usize,  // channel row
    pub step: usize, // column
    pub note_pitch: u8,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            row: 0,
            step: 0,
            note_pitch: 60,
        }
    }
}

impl TuiState {
    // keep the cursor on the grid after channels or steps change
    pub fn clamp_to(&mut self, ds: &DisplayState) {
        self.row = self.row.min(ds.channels.len().saturating_sub(1));
        self.step = self.step.min(ds.step_count.saturating_sub(1));
    }

    pub fn move_by(&mut self, rows: isize, steps: isize, ds: &DisplayState) {
        let wrap = |v: usize, d: isize, n: usize| {
            if n == 0 {
                0
            } else {
                (v as isize + d).rem_euclid(n as isize) as usize
            }
        };
        self.row = wrap(self.row, rows, ds.channels.len());
        self.step = wrap(self.step, steps, ds.step_count);
    }
}
