use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use clearpoints::{history::HistorySummary, layout::Visibility, session::Phase, Token};

use crate::{App, AppState};

/// Board units covered by one terminal cell. Cells are roughly twice as tall
/// as they are wide, so a square token spans twice as many columns as rows.
pub const CELL_WIDTH_PX: u32 = 10;
pub const CELL_HEIGHT_PX: u32 = 20;

const HORIZONTAL_MARGIN: u16 = 1;

fn screen_chunks(area: Rect) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(3), // title + status + history
            Constraint::Min(3),    // board
            Constraint::Length(1), // legend
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

fn board_block(round: u64) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" round {round} "))
}

/// Terminal cells available to tokens
pub fn board_area(area: Rect) -> Rect {
    let (_, board, _) = screen_chunks(area);
    board_block(0).inner(board)
}

/// Board dimensions in board units for a cell area
pub fn board_pixels(board: Rect) -> (u32, u32) {
    (
        board.width as u32 * CELL_WIDTH_PX,
        board.height as u32 * CELL_HEIGHT_PX,
    )
}

/// Topmost non-hidden token drawn over a terminal cell
pub fn token_at_cell(
    board: Rect,
    tokens: &[Token],
    token_size: u32,
    col: u16,
    row: u16,
) -> Option<u32> {
    tokens
        .iter()
        .rev()
        .filter(|t| t.visibility != Visibility::Hidden)
        .find(|t| {
            token_rect(board, t, token_size).is_some_and(|rect| {
                col >= rect.x && col < rect.right() && row >= rect.y && row < rect.bottom()
            })
        })
        .map(|t| t.id)
}

pub fn token_rect(board: Rect, token: &Token, token_size: u32) -> Option<Rect> {
    let col = token.position.x.max(0) as u32 / CELL_WIDTH_PX;
    let row = token.position.y.max(0) as u32 / CELL_HEIGHT_PX;
    let width = (token_size / CELL_WIDTH_PX).max(1);
    let height = (token_size / CELL_HEIGHT_PX).max(1);

    let rect = Rect::new(
        board.x.saturating_add(col.min(u16::MAX as u32) as u16),
        board.y.saturating_add(row.min(u16::MAX as u32) as u16),
        width.min(u16::MAX as u32) as u16,
        height.min(u16::MAX as u32) as u16,
    )
    .intersection(board);

    (!rect.is_empty()).then_some(rect)
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let snapshot = self.session.snapshot();
        let (header, board_chunk, legend_chunk) = screen_chunks(area);

        // styles
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let visible_style = Style::default()
            .patch(bold_style)
            .fg(Color::Black)
            .bg(Color::Yellow);
        let fading_style = Style::default()
            .patch(dim_style)
            .fg(Color::Gray)
            .bg(Color::DarkGray);

        let status = format!(
            "{:.1}s   {} points   {}   autoplay {}",
            snapshot.elapsed,
            snapshot.remaining(),
            snapshot.phase,
            if snapshot.autoplay { "ON" } else { "OFF" },
        );
        Paragraph::new(vec![
            Line::from(Span::styled(
                "Clear The Points",
                Style::default().patch(bold_style).fg(Color::Cyan),
            )),
            Line::from(Span::styled(status, dim_style.patch(bold_style))),
            Line::from(Span::styled(history_line(&self.summary), dim_style)),
        ])
        .alignment(Alignment::Center)
        .render(header, buf);

        let block = board_block(snapshot.round);
        let board = block.inner(board_chunk);
        block.render(board_chunk, buf);

        let token_size = self.session.board().geometry.token_size;
        for token in snapshot
            .tokens
            .iter()
            .filter(|t| t.visibility != Visibility::Hidden)
        {
            let Some(rect) = token_rect(board, token, token_size) else {
                continue;
            };
            let style = match token.visibility {
                Visibility::Fading => fading_style,
                _ => visible_style,
            };
            buf.set_style(rect, style);

            let label = token.id.to_string();
            let x = rect.x + rect.width.saturating_sub(label.width() as u16) / 2;
            let y = rect.y + (rect.height - 1) / 2;
            buf.set_stringn(x, y, &label, rect.width as usize, style);
        }

        match (self.state, snapshot.phase) {
            (AppState::ConfirmRestart, _) => {
                render_dialog(
                    board,
                    buf,
                    " Restart ",
                    vec![
                        Line::from(Span::styled("Do you want to restart the game?", bold_style)),
                        Line::from(""),
                        Line::from(Span::styled("(y)es / (n)o", italic_style)),
                    ],
                );
            }
            (_, Phase::Completed) => {
                render_dialog(
                    board,
                    buf,
                    " Result ",
                    vec![
                        Line::from(Span::styled(
                            "ALL CLEARED!!!",
                            Style::default().patch(bold_style).fg(Color::Green),
                        )),
                        Line::from(format!("{:.1} seconds", snapshot.elapsed)),
                        Line::from(Span::styled("(r) play again", italic_style)),
                    ],
                );
            }
            (_, Phase::Failed) => {
                render_dialog(
                    board,
                    buf,
                    " Result ",
                    vec![
                        Line::from(Span::styled(
                            "GAME OVER",
                            Style::default().patch(bold_style).fg(Color::Red),
                        )),
                        Line::from(format!(
                            "next was {} after {:.1} seconds",
                            snapshot.next_expected, snapshot.elapsed
                        )),
                        Line::from(Span::styled("(r) try again", italic_style)),
                    ],
                );
            }
            _ => {}
        }

        let mut legend = vec![];
        if !self.typed.is_empty() {
            legend.push(Span::styled(format!("> {}_   ", self.typed), bold_style));
        }
        legend.push(Span::styled(
            if self.is_round_active() {
                "(click) or (number + enter) / (a)utoplay / (r)estart / (esc)ape"
            } else {
                "(r)estart / (+/-) points / (a)utoplay / (esc)ape"
            },
            italic_style,
        ));
        Paragraph::new(Line::from(legend)).render(legend_chunk, buf);
    }
}

fn history_line(summary: &HistorySummary) -> String {
    let (Some(best), Some(average), Some(worst)) =
        (summary.best_secs, summary.average_secs, summary.worst_secs)
    else {
        return format!("{} rounds played, none cleared by hand", summary.rounds);
    };
    format!(
        "cleared {}/{}   best {best:.1}s   avg {average:.1}s   worst {worst:.1}s",
        summary.cleared, summary.rounds
    )
}

fn render_dialog(area: Rect, buf: &mut Buffer, title: &str, lines: Vec<Line>) {
    let width = lines.iter().map(|l| l.width()).max().unwrap_or(0) as u16 + 6;
    let height = lines.len() as u16 + 2;
    let rect = centered(area, width, height);

    Clear.render(rect, buf);
    Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(title.to_string()),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(rect, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;
    use clearpoints::config::Config;
    use clearpoints::layout::Position;

    fn create_test_app(points: u32) -> App {
        let cli = Cli::parse_from(["clearpoints", "--seed", "3", "--no-history"]);
        let config = Config {
            points,
            ..Config::default()
        };
        App::new(&cli, config, Rect::new(0, 0, 100, 30), None)
    }

    fn render(app: &App) -> String {
        let area = Rect::new(0, 0, 100, 30);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_board_area_inside_screen() {
        let area = Rect::new(0, 0, 80, 24);
        let board = board_area(area);
        assert!(board.width > 0 && board.height > 0);
        assert_eq!(area.intersection(board), board);
    }

    #[test]
    fn test_board_pixels_scale() {
        assert_eq!(board_pixels(Rect::new(0, 0, 8, 3)), (80, 60));
    }

    #[test]
    fn test_every_drawn_cell_hits_token() {
        let board = Rect::new(0, 0, 50, 20);
        let token = Token {
            id: 1,
            position: Position::new(17, 35),
            visibility: Visibility::Visible,
        };
        let tokens = [token];
        let rect = token_rect(board, &token, 40).unwrap();
        assert_eq!(rect, Rect::new(1, 1, 4, 2));

        for col in board.left()..board.right() {
            for row in board.top()..board.bottom() {
                let drawn =
                    col >= rect.x && col < rect.right() && row >= rect.y && row < rect.bottom();
                let hit = token_at_cell(board, &tokens, 40, col, row);
                assert_eq!(hit.is_some(), drawn, "cell ({col}, {row})");
            }
        }
    }

    #[test]
    fn test_token_at_cell_prefers_topmost_and_skips_hidden() {
        let board = Rect::new(2, 3, 50, 20);
        let under = Token {
            id: 1,
            position: Position::new(30, 30),
            visibility: Visibility::Visible,
        };
        let over = Token {
            id: 2,
            position: Position::new(40, 30),
            ..under
        };
        let (col, row) = (board.x + 4, board.y + 1);
        assert_eq!(token_at_cell(board, &[under, over], 40, col, row), Some(2));

        let hidden = Token {
            visibility: Visibility::Hidden,
            ..over
        };
        assert_eq!(token_at_cell(board, &[under, hidden], 40, col, row), Some(1));
        assert_eq!(token_at_cell(board, &[under, over], 40, board.x, board.y), None);
    }

    #[test]
    fn test_token_rect_clipped_to_board() {
        let board = Rect::new(0, 0, 10, 4);
        let token = Token {
            id: 1,
            position: Position::new(80, 60),
            visibility: Visibility::Visible,
        };
        let rect = token_rect(board, &token, 40).unwrap();
        assert_eq!(rect, Rect::new(8, 3, 2, 1));

        let off_board = Token {
            position: Position::new(500, 500),
            ..token
        };
        assert!(token_rect(board, &off_board, 40).is_none());
    }

    #[test]
    fn test_render_ready_board_shows_tokens() {
        let app = create_test_app(3);
        let content = render(&app);
        assert!(content.contains("Clear The Points"));
        assert!(content.contains("3 points"));
        assert!(content.contains("Ready"));
    }

    #[test]
    fn test_render_completed_banner() {
        let mut app = create_test_app(1);
        app.session.click(1);
        let content = render(&app);
        assert!(content.contains("ALL CLEARED!!!"));
        assert!(content.contains("(r) play again"));
    }

    #[test]
    fn test_render_failed_banner() {
        let mut app = create_test_app(3);
        app.session.click(2);
        let content = render(&app);
        assert!(content.contains("GAME OVER"));
    }

    #[test]
    fn test_render_confirm_dialog() {
        let mut app = create_test_app(3);
        app.state = AppState::ConfirmRestart;
        let content = render(&app);
        assert!(content.contains("Do you want to restart the game?"));
    }

    #[test]
    fn test_render_history_summary() {
        let mut app = create_test_app(3);
        assert!(render(&app).contains("0 rounds played, none cleared by hand"));

        app.summary = HistorySummary {
            rounds: 4,
            cleared: 3,
            best_secs: Some(1.2),
            worst_secs: Some(2.5),
            average_secs: Some(1.8),
        };
        let content = render(&app);
        assert!(content.contains("cleared 3/4   best 1.2s   avg 1.8s   worst 2.5s"));
    }

    #[test]
    fn test_render_tiny_area_does_not_panic() {
        let app = create_test_app(5);
        let area = Rect::new(0, 0, 4, 3);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
    }
}
