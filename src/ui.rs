use crate::app::Session;
use crate::noise::{NoiseMixer, NoiseVariant};
use crate::player::Player;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

const APP_TITLE: &str = "lofi  ";

struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    popup_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    alert: Color::Rgb(249, 174, 88),
    popup_bg: Color::Rgb(22, 33, 51),
};

pub fn draw(frame: &mut Frame, session: &Session) {
    let colors = &PALETTE;
    let player = &session.player;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let active_noise = session.noise.active_variants().len();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", player.catalog().len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(player.state().label(), Style::default().fg(colors.alert)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Noise {active_noise}/{}", NoiseVariant::ALL.len()),
            Style::default().fg(colors.text),
        ),
    ]))
    .block(panel_block("Status", colors.panel_bg, colors));
    frame.render_widget(header, vertical[0]);

    let song = if player.current_song_name().is_empty() {
        "-"
    } else {
        player.current_song_name()
    };
    let info = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                "Now",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {song}"), Style::default().fg(colors.text)),
        ]),
        Line::from(Span::styled(
            format!("History {}", player.history().len()),
            Style::default().fg(colors.muted),
        )),
    ])
    .block(panel_block("Now Playing", colors.panel_alt_bg, colors))
    .wrap(Wrap { trim: true });
    frame.render_widget(info, vertical[1]);

    let timeline = Paragraph::new(Span::styled(
        timeline_line(player, 26, 14),
        Style::default().fg(colors.text),
    ))
    .block(panel_block("Timeline", colors.panel_bg, colors));
    frame.render_widget(timeline, vertical[2]);

    let footer = Paragraph::new(transport_line(player, colors))
        .block(panel_block("Message", colors.panel_bg, colors));
    frame.render_widget(footer, vertical[3]);

    if session.dropdown.is_visible() {
        draw_noise_panel(frame, &session.noise, colors);
    }
}

fn transport_line<'a>(player: &'a Player, colors: &Palette) -> Line<'a> {
    let previous_style = if player.is_previous_disabled() {
        Style::default()
            .fg(colors.muted)
            .add_modifier(Modifier::DIM | Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(colors.muted)
    };
    let play_label = if player.is_playing() {
        "space pause"
    } else {
        "space play"
    };

    Line::from(vec![
        Span::styled(play_label, Style::default().fg(colors.muted)),
        Span::styled(", n next, ", Style::default().fg(colors.muted)),
        Span::styled("p previous", previous_style),
        Span::styled(
            ", m mute, d noise, q quit",
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(player.status.as_str(), Style::default().fg(colors.text)),
    ])
}

fn draw_noise_panel(frame: &mut Frame, noise: &NoiseMixer, colors: &Palette) {
    let popup = centered_rect(frame.area(), 50, 50);
    frame.render_widget(Clear, popup);

    let mut lines: Vec<Line> = NoiseVariant::ALL
        .iter()
        .enumerate()
        .map(|(idx, variant)| {
            let active = noise.is_active(*variant);
            let (marker, style) = if active {
                ("[x]", Style::default().fg(colors.accent))
            } else {
                ("[ ]", Style::default().fg(colors.text))
            };
            Line::from(vec![
                Span::styled(format!("{} ", idx + 1), Style::default().fg(colors.muted)),
                Span::styled(format!("{marker} {} noise", variant.label()), style),
            ])
        })
        .collect();

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        volume_text(noise.volume(), 14),
        Style::default().fg(colors.text),
    )));
    lines.push(Line::from(Span::styled(
        "1/2/3 toggle, [/] volume, M mute, Esc close",
        Style::default().fg(colors.muted),
    )));
    if !noise.status.is_empty() {
        lines.push(Line::from(Span::styled(
            noise.status.as_str(),
            Style::default().fg(colors.alert),
        )));
    }

    let panel = Paragraph::new(lines)
        .block(panel_block("Noise", colors.popup_bg, colors))
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, popup);
}

fn panel_block<'a>(title: &'a str, bg: Color, colors: &Palette) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(colors.border))
        .style(Style::default().bg(bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn timeline_line(player: &Player, timeline_bar_width: usize, volume_bar_width: usize) -> String {
    let duration = player.duration();
    let ratio = (duration.is_finite() && duration > 0.0)
        .then(|| (player.elapsed() / duration).clamp(0.0, 1.0));

    format!(
        "{} / {} {}  |  {}  +/- adjust",
        player.current_time_display(),
        player.duration_display(),
        progress_bar(ratio, timeline_bar_width),
        volume_text(player.volume(), volume_bar_width),
    )
}

fn volume_text(volume: f32, width: usize) -> String {
    if volume == 0.0 {
        return format!("Vol {} muted", progress_bar(Some(0.0), width));
    }
    format!(
        "Vol {} {:>3}%",
        progress_bar(Some(f64::from(volume)), width),
        (volume * 100.0).round() as u16
    )
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}
