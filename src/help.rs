use crate::terminal::Terminal;
use crossterm::style::Color;

pub const HELP_TITLE: &str = "Controls";

pub const HELP: &str = "\
Wheel      Zoom at pointer
Drag       Pan (flick to glide)
+/-        Zoom in/out
←↑↓→/hjkl  Pan
0          Reset view
Space      Pause map dispatch
?          Close help
q/Esc      Quit";

/// Boxed overlay centred on a `width×height` screen, title in the top
/// border. Rows that do not fit are dropped from the bottom.
pub fn render_help_overlay(term: &mut Terminal, width: u16, height: u16, title: &str, text: &str) {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() || width < 6 || height < 3 {
        return;
    }

    let inner = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count() + 2))
        .max()
        .unwrap_or(0)
        .min(width as usize - 4);
    let rows = lines.len().min(height as usize - 2);
    let left = (width as usize - inner - 4) / 2;
    let top = (height as usize - rows - 2) / 2;
    let (x0, y0) = (left as i32, top as i32);
    let right = x0 + inner as i32 + 3;

    let border = Some(Color::White);
    let edge = |term: &mut Terminal, y: i32, l: char, r: char| {
        term.set(x0, y, l, border, false);
        for x in x0 + 1..right {
            term.set(x, y, '─', border, false);
        }
        term.set(right, y, r, border, false);
    };
    edge(term, y0, '┌', '┐');
    edge(term, y0 + rows as i32 + 1, '└', '┘');
    term.set_str(x0 + 2, y0, &format!(" {} ", title), border, true);

    for (i, line) in lines.iter().take(rows).enumerate() {
        let y = y0 + 1 + i as i32;
        let body: String = line.chars().take(inner).collect();
        term.set(x0, y, '│', border, false);
        term.set_str(x0 + 1, y, &format!(" {:<width$} ", body, width = inner), Some(Color::Grey), false);
        term.set(right, y, '│', border, false);
    }
}
