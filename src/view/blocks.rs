//! Viewport composition: every block rendered as header, status, and
//! replay-compiled output behind a left border stripe.
//!
//! Composition also records clickable regions (copy and cancel) as
//! content-relative rows so mouse hit-testing survives scrolling.

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::config::Palette;
use crate::model::block::{BlockState, CommandBlock, CopyStatus};
use crate::primitives::{ansi, ansi_replay};

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Placeholder shown while a block owns the real terminal.
pub const DIRECT_MODE_NOTICE: &str =
    "[Running in full-screen mode - press any key to return when finished]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotKind {
    Copy,
    Cancel,
}

/// A clickable region at a content-relative row.
#[derive(Debug, Clone)]
pub struct Hotspot {
    pub id: u64,
    pub kind: HotspotKind,
    pub row: usize,
    pub col_start: u16,
    pub col_end: u16,
}

pub struct ComposedView {
    pub lines: Vec<Line<'static>>,
    pub hotspots: Vec<Hotspot>,
}

/// Border stripe width in columns ("┃ ").
const BORDER_WIDTH: u16 = 2;

pub fn compose(
    banner: Option<&str>,
    blocks: &[CommandBlock],
    palette: &Palette,
    width: u16,
    spinner_frame: usize,
) -> ComposedView {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut hotspots: Vec<Hotspot> = Vec::new();
    let content_width = width.saturating_sub(BORDER_WIDTH).max(8) as usize;

    if let Some(banner) = banner {
        for banner_line in banner.lines() {
            lines.push(Line::styled(
                banner_line.to_string(),
                Style::default().fg(palette.header),
            ));
        }
        lines.push(Line::default());
    }

    for block in blocks {
        let border = border_span(block, palette);

        // Header row 1: prompt snapshot and the copy hotspot.
        let mut header = vec![
            border.clone(),
            Span::styled(
                block.prompt_snapshot.clone(),
                Style::default().fg(palette.header),
            ),
            Span::raw(" "),
        ];
        let copy_col = BORDER_WIDTH + block.prompt_snapshot.width() as u16 + 1;
        let copy_text = match block.copy_status {
            CopyStatus::None => "⧉".to_string(),
            CopyStatus::Success => "⧉ ✓".to_string(),
            CopyStatus::Failure => format!(
                "⧉ ✗ {}",
                block.copy_error.as_deref().unwrap_or("copy failed")
            ),
        };
        let copy_width = copy_text.width() as u16;
        header.push(Span::styled(
            copy_text,
            Style::default().fg(palette.header_copy),
        ));
        hotspots.push(Hotspot {
            id: block.id,
            kind: HotspotKind::Copy,
            row: lines.len(),
            col_start: copy_col,
            col_end: copy_col + copy_width.max(1),
        });
        lines.push(Line::from(header));

        // Header row 2: status element and the command.
        let (status_span, command_style) = status_span(block, palette, spinner_frame);
        if block.is_active() {
            hotspots.push(Hotspot {
                id: block.id,
                kind: HotspotKind::Cancel,
                row: lines.len(),
                col_start: BORDER_WIDTH,
                col_end: BORDER_WIDTH + status_span.content.width() as u16,
            });
        }
        lines.push(Line::from(vec![
            border.clone(),
            status_span,
            Span::raw(" "),
            Span::styled(block.command.clone(), command_style),
        ]));

        lines.push(Line::from(vec![border.clone()]));

        if block.in_direct_mode {
            lines.push(Line::from(vec![
                border.clone(),
                Span::raw(DIRECT_MODE_NOTICE),
            ]));
        } else {
            let compiled =
                ansi_replay::compile(&String::from_utf8_lossy(&block.output), content_width);
            for output_line in ansi::styled_lines(&compiled) {
                let mut spans = vec![border.clone()];
                spans.extend(output_line.spans);
                lines.push(Line::from(spans));
            }
        }

        // One-row margin between blocks.
        lines.push(Line::default());
    }

    ComposedView { lines, hotspots }
}

fn border_span(block: &CommandBlock, palette: &Palette) -> Span<'static> {
    let color = if block.focused {
        palette.border_focus
    } else {
        palette.border
    };
    Span::styled("┃ ", Style::default().fg(color))
}

fn status_span(
    block: &CommandBlock,
    palette: &Palette,
    spinner_frame: usize,
) -> (Span<'static>, Style) {
    match block.state {
        BlockState::Running | BlockState::DirectMode => (
            Span::styled(
                SPINNER_FRAMES[spinner_frame % SPINNER_FRAMES.len()].to_string(),
                Style::default().fg(palette.running),
            ),
            Style::default().fg(palette.header_command_running),
        ),
        BlockState::Succeeded => (
            Span::styled(
                format!("✓ ({})", format_duration(block.elapsed())),
                Style::default().fg(palette.completed),
            ),
            Style::default().fg(palette.header_command_done),
        ),
        BlockState::Failed | BlockState::Cancelled => (
            Span::styled(
                format!("✗ {}", block.exit_code),
                Style::default()
                    .fg(palette.failed)
                    .add_modifier(Modifier::BOLD),
            ),
            Style::default().fg(palette.header_command_failed),
        ),
    }
}

/// Short runtimes show milliseconds, anything past a few seconds rounds
/// to whole seconds.
pub fn format_duration(d: std::time::Duration) -> String {
    if d > std::time::Duration::from_secs(3) {
        format!("{}s", d.as_secs_f64().round() as u64)
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UiConfig;
    use std::time::Duration;

    fn palette() -> Palette {
        Palette::from_config(&UiConfig::default())
    }

    fn rendered(view: &ComposedView) -> Vec<String> {
        view.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn finished_block(id: u64, exit_code: i32) -> CommandBlock {
        let mut block = CommandBlock::new(id, "echo hi".into(), "~/src".into());
        block.append_output(b"hi\n");
        block.finish(
            if exit_code == 0 {
                BlockState::Succeeded
            } else {
                BlockState::Failed
            },
            exit_code,
        );
        block
    }

    #[test]
    fn block_renders_header_output_and_margin() {
        let block = finished_block(1, 0);
        let view = compose(None, std::slice::from_ref(&block), &palette(), 80, 0);
        let text = rendered(&view);

        assert!(text[0].contains("~/src"));
        assert!(text[1].contains("echo hi"));
        assert!(text[1].contains("✓"));
        assert!(text.iter().any(|l| l.contains("hi")));
        assert_eq!(text.last().unwrap(), "");
    }

    #[test]
    fn failed_block_shows_exit_code() {
        let block = finished_block(1, 2);
        let view = compose(None, std::slice::from_ref(&block), &palette(), 80, 0);
        assert!(rendered(&view)[1].contains("✗ 2"));
    }

    #[test]
    fn running_block_has_cancel_hotspot() {
        let block = CommandBlock::new(3, "sleep 5".into(), "~".into());
        let view = compose(None, std::slice::from_ref(&block), &palette(), 80, 0);

        assert!(view
            .hotspots
            .iter()
            .any(|h| h.kind == HotspotKind::Cancel && h.id == 3));
    }

    #[test]
    fn finished_block_has_no_cancel_hotspot() {
        let block = finished_block(4, 0);
        let view = compose(None, std::slice::from_ref(&block), &palette(), 80, 0);

        assert!(view.hotspots.iter().all(|h| h.kind != HotspotKind::Cancel));
        assert!(view
            .hotspots
            .iter()
            .any(|h| h.kind == HotspotKind::Copy && h.id == 4));
    }

    #[test]
    fn direct_mode_block_shows_notice_instead_of_output() {
        let mut block = CommandBlock::new(5, "vim".into(), "~".into());
        block.state = BlockState::DirectMode;
        block.in_direct_mode = true;
        block.append_output(b"should not appear");

        let view = compose(None, std::slice::from_ref(&block), &palette(), 80, 0);
        let text = rendered(&view);
        assert!(text.iter().any(|l| l.contains(DIRECT_MODE_NOTICE)));
        assert!(!text.iter().any(|l| l.contains("should not appear")));
    }

    #[test]
    fn banner_precedes_blocks() {
        let block = finished_block(1, 0);
        let view = compose(
            Some("user@host\nos: linux"),
            std::slice::from_ref(&block),
            &palette(),
            80,
            0,
        );
        let text = rendered(&view);
        assert_eq!(text[0], "user@host");
        assert_eq!(text[1], "os: linux");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::from_millis(123)), "123ms");
        assert_eq!(format_duration(Duration::from_secs(4)), "4s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2500ms");
    }
}
