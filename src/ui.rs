pub mod charting;
pub mod dashboard;
pub mod screen;

use std::ops::Range;

use gemtype::{
    config::{CursorStyle, DisplaySettings, Theme},
    reporter::SaveStatus,
    session::Status,
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{ui::screen::current_screen, App};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Draw whatever screen the app is on
pub fn draw(app: &App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}

/// Foreground colors for a theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub accent: Color,
    pub correct: Color,
    pub incorrect: Color,
    pub pending: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        let (accent, correct, incorrect, pending) = match theme {
            Theme::Dark => (Color::Yellow, Color::Green, Color::Red, Color::DarkGray),
            Theme::Light => (Color::Blue, Color::Green, Color::Red, Color::Gray),
            Theme::Blue => (Color::LightBlue, Color::Cyan, Color::LightRed, Color::DarkGray),
            Theme::Green => (Color::LightGreen, Color::Green, Color::Red, Color::DarkGray),
            Theme::Purple => (
                Color::LightMagenta,
                Color::Magenta,
                Color::LightRed,
                Color::DarkGray,
            ),
            Theme::Red => (Color::LightRed, Color::White, Color::Red, Color::DarkGray),
            Theme::Orange => (
                Color::Rgb(255, 165, 0),
                Color::LightYellow,
                Color::Red,
                Color::DarkGray,
            ),
        };
        Self {
            accent,
            correct,
            incorrect,
            pending,
        }
    }
}

/// Style of the character under the caret
pub fn cursor_style(display: &DisplaySettings, palette: &Palette) -> Style {
    let style = match display.cursor_style {
        CursorStyle::Block => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::REVERSED),
        CursorStyle::Line => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
        CursorStyle::Underline => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::UNDERLINED),
        CursorStyle::Outline => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC | Modifier::UNDERLINED),
    };
    if display.caret_opacity < 0.5 {
        style.add_modifier(Modifier::DIM)
    } else {
        style
    }
}

/// Split text into rows of `words_per_line` words. Each range covers the
/// row's characters including the space that ends it.
pub fn wrap_words(chars: &[char], words_per_line: usize) -> Vec<Range<usize>> {
    let words_per_line = words_per_line.max(1);
    let mut rows = Vec::new();
    let mut start = 0;
    let mut words = 0;
    for (idx, c) in chars.iter().enumerate() {
        if *c == ' ' {
            words += 1;
            if words == words_per_line {
                rows.push(start..idx + 1);
                start = idx + 1;
                words = 0;
            }
        }
    }
    if start < chars.len() {
        rows.push(start..chars.len());
    }
    rows
}

impl App {
    fn typing_lines(&self, palette: &Palette) -> Vec<Line<'static>> {
        let session = &self.session;
        let chars: Vec<char> = session.target().chars().collect();
        let typed = session.typed();
        let caret = cursor_style(&self.display, palette);
        let show_caret = session.status() != Status::Finished;

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let correct = bold.fg(palette.correct);
        let incorrect = bold.fg(palette.incorrect);
        let pending = Style::default().fg(palette.pending);

        wrap_words(&chars, self.display.words_per_line)
            .into_iter()
            .map(|row| {
                let spans = row
                    .map(|idx| {
                        let expected = chars[idx];
                        match typed.get(idx) {
                            Some(&c) if c == expected => Span::styled(expected.to_string(), correct),
                            Some(_) => Span::styled(
                                match expected {
                                    ' ' => "·".to_owned(),
                                    c => c.to_string(),
                                },
                                incorrect,
                            ),
                            None if idx == typed.len() && show_caret => {
                                Span::styled(expected.to_string(), caret)
                            }
                            None => Span::styled(expected.to_string(), pending),
                        }
                    })
                    .collect::<Vec<_>>();
                Line::from(spans)
            })
            .collect()
    }

    fn status_line(&self, palette: &Palette) -> Line<'static> {
        let session = &self.session;
        let dim = Style::default().add_modifier(Modifier::DIM);
        let accent = Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD);

        let mut spans = vec![
            Span::styled(format!("{}", self.level), accent),
            Span::styled("  ", dim),
            Span::styled(format!("{}", session.duration()), dim),
        ];

        let (wpm, accuracy) = session.live_metrics();
        if self.display.show_timer {
            spans.push(Span::styled(format!("   {}s left", session.time_left()), accent));
        }
        if session.status() == Status::InProgress {
            if self.display.show_live_wpm {
                spans.push(Span::styled(format!("   {wpm} wpm"), dim));
            }
            if self.display.show_accuracy {
                spans.push(Span::styled(format!("   {accuracy}% acc"), dim));
            }
        }
        Line::from(spans)
    }

    fn render_typing(&self, area: Rect, buf: &mut Buffer, palette: &Palette) {
        let italic = Style::default().add_modifier(Modifier::ITALIC);
        let lines = if self.loading {
            vec![Line::from(Span::styled(
                format!("Generating {} text...", self.level),
                italic,
            ))]
        } else {
            self.typing_lines(palette)
        };
        let row_width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1) as usize;
        let text_height = lines
            .iter()
            .map(|l| l.width().max(1).div_ceil(row_width))
            .sum::<usize>() as u16;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(area.height.saturating_sub(text_height + 6) / 2),
                Constraint::Length(1), // status
                Constraint::Length(1), // notice
                Constraint::Length(text_height),
                Constraint::Min(1),
                Constraint::Length(1), // hints
            ])
            .split(area);

        Paragraph::new(self.status_line(palette))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        if self.practice.as_ref().is_some_and(|p| p.is_fallback) && !self.loading {
            Paragraph::new(Span::styled(
                "text generation unavailable, using offline text",
                italic.fg(Color::Yellow),
            ))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
        }

        // a prompt that fits on one row reads best centered
        let centered = lines.len() == 1 && self.session.target().width() <= row_width;
        Paragraph::new(lines)
            .alignment(if centered {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: false })
            .render(chunks[3], buf);

        let hints = match self.session.status() {
            Status::InProgress => "(ctrl+r) restart / (esc)ape",
            _ => "(1/2/3) level / (tab) duration / (enter) start / (d)ashboard / (esc)ape",
        };
        Paragraph::new(Span::styled(hints, italic)).render(chunks[5], buf);
    }

    fn render_results(&self, area: Rect, buf: &mut Buffer, palette: &Palette) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let italic = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1), // headline
                Constraint::Length(1), // details
                Constraint::Length(1), // padding
                Constraint::Length(1), // save status
                Constraint::Min(1),
                Constraint::Length(1), // legend
            ])
            .split(area);

        let Some(result) = self.last_result else {
            return;
        };

        Paragraph::new(Span::styled(
            format!(
                "{} WPM   {}% accuracy   {} mistakes",
                result.wpm, result.accuracy, result.mistakes
            ),
            bold.fg(palette.accent),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        Paragraph::new(Span::styled(
            format!("{} / {}", result.level, result.duration),
            Style::default().add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        let (message, color) = match self.reporter.status() {
            SaveStatus::Idle => (String::new(), Color::Gray),
            SaveStatus::Saving => ("Saving results...".to_owned(), Color::Yellow),
            SaveStatus::Saved => (
                format!("Results saved ({})", self.reporter.sink_name()),
                palette.correct,
            ),
            SaveStatus::Failed => (
                "Failed to save results, (s) to retry".to_owned(),
                palette.incorrect,
            ),
        };
        Paragraph::new(Span::styled(message, italic.fg(color)))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);

        Paragraph::new(Span::styled(
            "(r) new text / (s)ave / (tab) duration / (1/2/3) level / (d)ashboard / (esc)ape",
            italic,
        ))
        .render(chunks[6], buf);
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let palette = Palette::for_theme(self.display.theme);
        match self.session.status() {
            Status::Finished if self.last_result.is_some() => {
                self.render_results(area, buf, &palette)
            }
            _ => self.render_typing(area, buf, &palette),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_wrap_words_rows() {
        let text = chars("one two three four five");
        let rows = wrap_words(&text, 2);
        assert_eq!(rows, vec![0..8, 8..19, 19..23]);
        let rendered: Vec<String> = rows
            .into_iter()
            .map(|r| text[r].iter().collect())
            .collect();
        assert_eq!(rendered, vec!["one two ", "three four ", "five"]);
    }

    #[test]
    fn test_wrap_words_single_row() {
        let text = chars("short text");
        assert_eq!(wrap_words(&text, 10), vec![0..10]);
        assert!(wrap_words(&[], 10).is_empty());
    }

    #[test]
    fn test_wrap_words_zero_is_one() {
        let text = chars("a b");
        assert_eq!(wrap_words(&text, 0), vec![0..2, 2..3]);
    }

    #[test]
    fn test_cursor_styles() {
        let palette = Palette::for_theme(Theme::Dark);
        let mut display = DisplaySettings::default();
        assert!(cursor_style(&display, &palette)
            .add_modifier
            .contains(Modifier::REVERSED));

        display.cursor_style = CursorStyle::Underline;
        display.caret_opacity = 0.2;
        let style = cursor_style(&display, &palette);
        assert!(style.add_modifier.contains(Modifier::UNDERLINED));
        assert!(style.add_modifier.contains(Modifier::DIM));
    }

    #[test]
    fn test_every_theme_has_distinct_feedback_colors() {
        for theme in [
            Theme::Dark,
            Theme::Light,
            Theme::Blue,
            Theme::Green,
            Theme::Purple,
            Theme::Red,
            Theme::Orange,
        ] {
            let p = Palette::for_theme(theme);
            assert_ne!(p.correct, p.incorrect, "{theme}");
        }
    }
}
