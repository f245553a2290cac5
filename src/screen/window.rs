use crate::character::{Character, LineProperty};

use super::screen::{Screen, SelectionMode, SelectionOptions};

/// A sliding view of `window_lines` contiguous rows over the combined
/// history + screen space. Line 0 is the oldest history line.
///
/// The window holds only view state; it borrows the screen per call, so the
/// emulation stays the single owner of the image.
#[derive(Debug)]
pub struct ScreenWindow {
    current_line: usize,
    window_lines: usize,
    /// Snap back to the live end whenever new output arrives.
    track_output: bool,
}

impl ScreenWindow {
    pub fn new(window_lines: usize) -> Self {
        Self {
            current_line: 0,
            window_lines: window_lines.max(1),
            track_output: true,
        }
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }

    pub fn window_lines(&self) -> usize {
        self.window_lines
    }

    pub fn set_window_lines(&mut self, lines: usize) {
        self.window_lines = lines.max(1);
    }

    pub fn set_track_output(&mut self, track: bool) {
        self.track_output = track;
    }

    /// Greatest valid `current_line` for this screen.
    fn max_top_line(&self, screen: &Screen) -> usize {
        screen.total_lines().saturating_sub(self.window_lines)
    }

    pub fn at_end(&self, screen: &Screen) -> bool {
        self.current_line >= self.max_top_line(screen)
    }

    pub fn scroll_to(&mut self, screen: &Screen, line: usize) {
        self.current_line = line.min(self.max_top_line(screen));
        self.track_output = self.at_end(screen);
    }

    pub fn scroll_by(&mut self, screen: &Screen, delta: isize) {
        let target = self.current_line as isize + delta;
        self.scroll_to(screen, target.max(0) as usize);
    }

    pub fn scroll_pages(&mut self, screen: &Screen, pages: isize) {
        self.scroll_by(screen, pages * self.window_lines as isize / 2);
    }

    pub fn scroll_to_end(&mut self, screen: &Screen) {
        self.current_line = self.max_top_line(screen);
        self.track_output = true;
    }

    /// Called after the emulation processed output; a tracking window
    /// follows the live end.
    pub fn notify_output_changed(&mut self, screen: &Screen) {
        if self.track_output {
            self.current_line = self.max_top_line(screen);
        } else {
            self.current_line = self.current_line.min(self.max_top_line(screen));
        }
    }

    /// The visible image as a flat array, `window_lines * columns` cells.
    pub fn get_image(&self, screen: &mut Screen) -> Vec<Character> {
        let columns = screen.columns();
        let mut image = vec![Character::default(); self.window_lines * columns];
        screen.image(
            &mut image,
            self.current_line,
            self.current_line + self.window_lines,
        );
        image
    }

    pub fn get_line_properties(&self, screen: &mut Screen) -> Vec<LineProperty> {
        screen.line_property_range(self.current_line, self.current_line + self.window_lines)
    }

    /// Start a selection at window-relative coordinates.
    pub fn set_selection_start(
        &self,
        screen: &mut Screen,
        line: usize,
        column: usize,
        mode: SelectionMode,
    ) {
        screen.set_selection_start(self.current_line + line, column, mode);
    }

    pub fn set_selection_end(&self, screen: &mut Screen, line: usize, column: usize) {
        screen.set_selection_end(self.current_line + line, column);
    }

    pub fn selected_text(&self, screen: &mut Screen, options: SelectionOptions) -> String {
        screen.selected_text(options)
    }

    /// The selection in window-relative coordinates, when it intersects the
    /// window.
    pub fn selection_in_window(
        &self,
        screen: &Screen,
    ) -> Option<((isize, usize), (isize, usize), SelectionMode)> {
        let (tl, br, mode) = screen.selection_range()?;
        let top = self.current_line;
        let bottom = self.current_line + self.window_lines;
        if br.0 < top || tl.0 >= bottom {
            return None;
        }
        Some((
            (tl.0 as isize - top as isize, tl.1),
            (br.0 as isize - top as isize, br.1),
            mode,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::ExtendedCharTable;
    use crate::history::{HistoryMode, HistoryScroll};

    fn screen_with_lines(n: usize) -> Screen {
        let mut s = Screen::new(
            4,
            10,
            HistoryScroll::new(&HistoryMode::Bounded(100), None).unwrap(),
            ExtendedCharTable::new(8),
            vec![],
            true,
        );
        for i in 0..n {
            for c in format!("l{i}").chars() {
                s.show_character(c);
            }
            s.carriage_return();
            s.index();
        }
        s
    }

    fn window_text(w: &ScreenWindow, s: &mut Screen) -> Vec<String> {
        let columns = s.columns();
        w.get_image(s)
            .chunks(columns)
            .map(|row| {
                row.iter()
                    .map(|c| c.literal_char())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn tracking_window_follows_output() {
        let mut s = screen_with_lines(10);
        let mut w = ScreenWindow::new(4);
        w.notify_output_changed(&s);
        assert!(w.at_end(&s));
        let rows = window_text(&w, &mut s);
        assert_eq!(rows[0], "l7");
    }

    #[test]
    fn scrolling_back_stops_tracking() {
        let s = screen_with_lines(10);
        let mut w = ScreenWindow::new(4);
        w.notify_output_changed(&s);
        w.scroll_by(&s, -3);
        assert!(!w.at_end(&s));
        let before = w.current_line();
        w.notify_output_changed(&s);
        assert_eq!(w.current_line(), before, "detached window stays put");
        w.scroll_to_end(&s);
        assert!(w.at_end(&s));
    }

    #[test]
    fn scroll_clamps_to_valid_range() {
        let s = screen_with_lines(2);
        let mut w = ScreenWindow::new(4);
        w.scroll_by(&s, -100);
        assert_eq!(w.current_line(), 0);
        w.scroll_by(&s, 100);
        assert_eq!(w.current_line(), s.total_lines() - 4);
    }

    #[test]
    fn window_selection_uses_view_coordinates() {
        let mut s = screen_with_lines(10);
        let mut w = ScreenWindow::new(4);
        w.notify_output_changed(&s);
        w.set_selection_start(&mut s, 0, 0, SelectionMode::Stream);
        w.set_selection_end(&mut s, 0, 1);
        assert_eq!(
            w.selected_text(&mut s, SelectionOptions::PRESERVE_LINE_BREAKS),
            "l7"
        );
        let ((top, _), _, _) = w.selection_in_window(&s).unwrap();
        assert_eq!(top, 0);
    }
}
