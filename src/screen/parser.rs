//! VT parser: a persistent [`vte::Parser`] driving a [`VirtualScreen`].
//!
//! Grounded on `cco`'s `AnsiParser`/`AnsiPerformer` pair (a `vte::Parser`
//! wrapped with a `Perform` implementation dispatching into a terminal
//! buffer), generalized from that toy implementation's handful of cases to
//! the full CSI/ESC operation table: scroll regions, alternate screen,
//! insert/delete line and char, save/restore cursor.
//!
//! The `vte::Parser` instance is kept across calls to [`Screen::write`] so
//! that an incomplete UTF-8 sequence or a CSI sequence split across two
//! writes resumes correctly; this carry-over is handled internally by
//! `vte`, not by us.

use vte::{Params, Parser, Perform};

use super::VirtualScreen;

pub struct Screen {
    parser: Parser,
    state: VirtualScreen,
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        Screen {
            parser: Parser::new(),
            state: VirtualScreen::new(cols, rows),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        let mut performer = Performer { screen: &mut self.state };
        for &byte in bytes {
            self.parser.advance(&mut performer, byte);
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.state.resize(cols, rows);
    }

    pub fn screen(&self) -> &VirtualScreen {
        &self.state
    }
}

struct Performer<'a> {
    screen: &'a mut VirtualScreen,
}

fn csi_params(params: &Params) -> Vec<i64> {
    params.iter().map(|p| *p.first().unwrap_or(&0) as i64).collect()
}

/// `0` and absence both mean "use the default" per the wire parameter rule.
fn param_or(params: &[i64], idx: usize, default: i64) -> i64 {
    match params.get(idx) {
        Some(&v) if v != 0 => v,
        _ => default,
    }
}

impl<'a> Perform for Performer<'a> {
    fn print(&mut self, c: char) {
        self.screen.active_grid_mut().put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        let grid = self.screen.active_grid_mut();
        match byte {
            0x08 => {
                if grid.cursor_col > 0 {
                    grid.cursor_col -= 1;
                }
                grid.wrap_pending = false;
            }
            0x09 => {
                let next = ((grid.cursor_col / 8) + 1) * 8;
                grid.cursor_col = next.min(grid.cols - 1);
                grid.wrap_pending = false;
            }
            0x0A | 0x0B | 0x0C => grid.linefeed(),
            0x0D => {
                grid.cursor_col = 0;
                grid.wrap_pending = false;
            }
            0x07 => {}
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {
        // Parsed and discarded: no title/clipboard support.
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let p = csi_params(params);
        let private = intermediates.contains(&b'?');
        let grid = self.screen.active_grid_mut();

        match action {
            'A' => grid.cursor_up(param_or(&p, 0, 1).max(1) as usize),
            'B' => grid.cursor_down(param_or(&p, 0, 1).max(1) as usize),
            'C' => grid.cursor_forward(param_or(&p, 0, 1).max(1) as usize),
            'D' => grid.cursor_back(param_or(&p, 0, 1).max(1) as usize),
            'E' => {
                grid.cursor_down(param_or(&p, 0, 1).max(1) as usize);
                grid.cursor_col = 0;
            }
            'F' => {
                grid.cursor_up(param_or(&p, 0, 1).max(1) as usize);
                grid.cursor_col = 0;
            }
            'G' => {
                let col = (param_or(&p, 0, 1).max(1) - 1) as usize;
                grid.move_cursor(grid.cursor_row, col);
            }
            'd' => {
                let row = (param_or(&p, 0, 1).max(1) - 1) as usize;
                grid.move_cursor(row, grid.cursor_col);
            }
            'H' | 'f' => {
                let row = (param_or(&p, 0, 1).max(1) - 1) as usize;
                let col = (param_or(&p, 1, 1).max(1) - 1) as usize;
                grid.move_cursor(row, col);
            }
            'J' => grid.erase_display(param_or(&p, 0, 0)),
            'K' => grid.erase_line(param_or(&p, 0, 0)),
            'X' => grid.erase_chars(param_or(&p, 0, 1).max(1) as usize),
            'L' => grid.insert_lines(param_or(&p, 0, 1).max(1) as usize),
            'M' => grid.delete_lines(param_or(&p, 0, 1).max(1) as usize),
            '@' => grid.insert_chars(param_or(&p, 0, 1).max(1) as usize),
            'P' => grid.delete_chars(param_or(&p, 0, 1).max(1) as usize),
            'S' => grid.scroll_up(param_or(&p, 0, 1).max(1) as usize),
            'T' => grid.scroll_down(param_or(&p, 0, 1).max(1) as usize),
            'r' => {
                let top = (param_or(&p, 0, 1).max(1) - 1) as usize;
                let bottom = (param_or(&p, 1, grid.rows as i64).max(1) - 1) as usize;
                grid.set_scroll_region(top, bottom);
            }
            's' => grid.save_cursor(),
            'u' => grid.restore_cursor(),
            'h' if private => {
                if matches!(p.first(), Some(47) | Some(1047) | Some(1049)) {
                    self.screen.enter_alternate();
                }
            }
            'l' if private => {
                if matches!(p.first(), Some(47) | Some(1047) | Some(1049)) {
                    self.screen.leave_alternate();
                }
            }
            // SGR / DSR / DA / DECSCUSR: accepted, no state change.
            'm' | 'n' | 'c' | 'q' => {}
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if matches!(intermediates.first(), Some(&b'(') | Some(&b')')) {
            // Charset designation (ESC ( x / ESC ) x): the designator byte
            // arrives here as `byte`, always ignored.
            return;
        }
        match byte {
            b'7' => self.screen.active_grid_mut().save_cursor(),
            b'8' => self.screen.active_grid_mut().restore_cursor(),
            b'M' => self.screen.active_grid_mut().reverse_index(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_restore_cursor_round_trips() {
        let mut s = Screen::new(20, 10);
        s.write(b"\x1b[5;5H\x1b[s\x1b[10;10H\x1b[u");
        assert_eq!(s.screen().cursor(), (4, 4));
    }

    #[test]
    fn tab_advances_to_next_multiple_of_eight() {
        let mut s = Screen::new(20, 1);
        s.write(b"a\t");
        assert_eq!(s.screen().cursor(), (0, 8));
    }

    #[test]
    fn backspace_decrements_column_but_not_below_zero() {
        let mut s = Screen::new(5, 1);
        s.write(b"\x08\x08a\x08");
        assert_eq!(s.screen().cursor(), (0, 0));
    }

    #[test]
    fn reverse_index_scrolls_down_at_scroll_top() {
        let mut s = Screen::new(5, 3);
        s.write(b"a\r\nb\r\nc\x1b[H\x1bM");
        let cap = s.screen().capture(0);
        assert_eq!(cap[0], "");
        assert_eq!(cap[1], "a");
        assert_eq!(cap[2], "b");
    }
}
