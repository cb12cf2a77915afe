/// Main dashboard screen

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{Dialog, Screen, VITALS_FIELDS};
use crate::core::analytics::Analytics;
use crate::core::referral::{Status, TriageColor};
use crate::core::vitals::{recent_vitals, QUICK_INTERVENTIONS};
use crate::core::{isbar, Event, FacilityMeta, Referral, RejectReason};
use crate::utils::{format_clock, format_minutes, format_timestamp, truncate_string};

fn triage_color(color: TriageColor) -> Color {
    match color {
        TriageColor::Red => Color::Red,
        TriageColor::Yellow => Color::Yellow,
        TriageColor::Green => Color::Green,
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Prealert => Color::Magenta,
        Status::Accepted => Color::Cyan,
        Status::Enroute => Color::Yellow,
        Status::ArriveDest => Color::Green,
        Status::Handover => Color::Gray,
        Status::Rejected => Color::Red,
    }
}

fn sex_initial(r: &Referral) -> char {
    r.patient.sex.to_string().chars().next().unwrap_or('?')
}

fn label(text: &str) -> Span<'static> {
    Span::styled(text.to_string(), Style::default().fg(Color::Gray))
}

fn value(text: String, color: Color) -> Span<'static> {
    Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

/// Popup area centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = area.width.min(width);
    let height = area.height.min(height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

pub struct Dashboard {
    title: String,
    facility: String,
    facilities: Vec<(String, FacilityMeta)>,
    queue: Vec<Referral>,
    analytics: Option<Analytics>,
    events: Vec<Event>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            title: "Receiving Hospital Dashboard".to_string(),
            facility: String::new(),
            facilities: Vec::new(),
            queue: Vec::new(),
            analytics: None,
            events: Vec::new(),
        }
    }

    pub fn update_facility(&mut self, facility: String, facilities: Vec<(String, FacilityMeta)>) {
        self.facility = facility;
        self.facilities = facilities;
    }

    pub fn update_queue(&mut self, queue: Vec<Referral>) {
        self.queue = queue;
    }

    pub fn update_analytics(&mut self, analytics: Analytics) {
        self.analytics = Some(analytics);
    }

    /// Newest first
    pub fn update_events(&mut self, events: Vec<Event>) {
        self.events = events;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        frame: &mut Frame,
        current_screen: Screen,
        selected_index: usize,
        status_message: Option<&str>,
        show_help: bool,
        search_mode: bool,
        search_buffer: &str,
        detail: Option<&Referral>,
        dialog: Option<&Dialog>,
    ) {
        // Referral detail replaces the whole screen
        if let Some(referral) = detail {
            self.render_detail(frame, referral, status_message);
            if let Some(dialog) = dialog {
                self.render_dialog(frame, dialog);
            }
            if show_help {
                self.render_help(frame, current_screen);
            }
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Title + KPI strip
                Constraint::Length(3), // Menu
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        frame.render_widget(self.render_header(), chunks[0]);

        // Menu bar
        let menu_items: Vec<Span> = Screen::all()
            .iter()
            .enumerate()
            .flat_map(|(i, screen)| {
                let style = if *screen == current_screen {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                vec![
                    Span::styled(format!(" [{}] {} ", i + 1, screen.title()), style),
                    Span::raw("  "),
                ]
            })
            .collect();

        let menu = Paragraph::new(Line::from(menu_items)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(menu, chunks[1]);

        match current_screen {
            Screen::Queue => self.render_queue(frame, chunks[2], selected_index, search_buffer),
            Screen::Analytics => self.render_analytics(frame, chunks[2]),
            Screen::Events => self.render_events(frame, chunks[2]),
            Screen::Facility => self.render_facility(frame, chunks[2]),
        }

        // Footer with status message or key hints
        let footer_text = if let Some(status) = status_message {
            status.to_string()
        } else if search_mode {
            format!("Search: {} | [Enter] Apply | [Esc] Cancel", search_buffer)
        } else {
            match current_screen {
                Screen::Queue => "[↑↓] Select | [Enter] Details | [a]ccept [e]n route arri[v]ed [h]andover re[x]ect | [t] Vitals | [i] Interventions | [/] Search | [?] Help | [q]uit".to_string(),
                Screen::Analytics => "[Tab] Next screen | [f/F] Facility | [?] Help | [q]uit".to_string(),
                Screen::Events => "[Tab] Next screen | Live from the event log | [?] Help | [q]uit".to_string(),
                Screen::Facility => "[f/F] Facility | [+/-] ICU beds | [n] New day load | [r] Reload | [?] Help | [q]uit".to_string(),
            }
        };

        let footer = Paragraph::new(footer_text)
            .alignment(Alignment::Center)
            .style(if status_message.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);

        if let Some(dialog) = dialog {
            self.render_dialog(frame, dialog);
        }
        if show_help {
            self.render_help(frame, current_screen);
        }
    }

    fn render_header(&self) -> Paragraph<'static> {
        let title_line = Line::from(vec![
            Span::styled(
                self.title.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            label("Facility: "),
            value(self.facility.clone(), Color::White),
        ]);

        let kpi_line = match &self.analytics {
            Some(a) => {
                let k = &a.kpis;
                let acceptance_color = if k.acceptance_rate < 60.0 {
                    Color::Red
                } else if k.acceptance_rate < 80.0 {
                    Color::Yellow
                } else {
                    Color::Green
                };
                let icu_color = match k.icu_open {
                    0 => Color::Red,
                    1..=2 => Color::Yellow,
                    _ => Color::Green,
                };
                Line::from(vec![
                    label("Referrals today: "),
                    value(k.total.to_string(), Color::White),
                    Span::raw(" | "),
                    label("Awaiting/Active: "),
                    value(k.awaiting.to_string(), Color::Magenta),
                    Span::raw(" | "),
                    label("En route: "),
                    value(k.enroute.to_string(), Color::Yellow),
                    Span::raw(" | "),
                    label("Arrived: "),
                    value(k.arrived.to_string(), Color::Green),
                    Span::raw(" | "),
                    label("Acceptance: "),
                    value(format!("{:.0}%", k.acceptance_rate), acceptance_color),
                    Span::raw(" | "),
                    label("ICU beds open: "),
                    value(k.icu_open.to_string(), icu_color),
                ])
            }
            None => Line::from(label("Loading...")),
        };

        Paragraph::new(vec![title_line, kpi_line])
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
    }

    fn render_queue(&self, frame: &mut Frame, area: Rect, selected_index: usize, search_buffer: &str) {
        let header = Row::new(vec![
            "ID", "Patient", "Age/Sex", "Triage", "Complaint", "Priority", "Status", "Ambulance", "ETA", "From", "Decision",
        ])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .bottom_margin(1);

        let rows: Vec<Row> = self
            .queue
            .iter()
            .enumerate()
            .map(|(idx, r)| {
                let style = if idx == selected_index {
                    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let color = r.triage_color();
                Row::new(vec![
                    Cell::from(r.id.clone()),
                    Cell::from(r.patient.name.clone()),
                    Cell::from(format!("{}/{}", r.patient.age, sex_initial(r))),
                    Cell::from(Span::styled(
                        format!("● {}", color),
                        Style::default().fg(triage_color(color)).add_modifier(Modifier::BOLD),
                    )),
                    Cell::from(r.triage.complaint.to_string()),
                    Cell::from(r.transport.priority.to_string()),
                    Cell::from(Span::styled(r.status.to_string(), Style::default().fg(status_color(r.status)))),
                    Cell::from(r.transport.ambulance.map(|a| a.to_string()).unwrap_or_else(|| "—".to_string())),
                    Cell::from(r.transport.eta_min.map(|m| format!("{} min", m)).unwrap_or_else(|| "—".to_string())),
                    Cell::from(truncate_string(&r.referrer.facility, 22)),
                    Cell::from(format_clock(r.times.decision_ts)),
                ])
                .style(style)
            })
            .collect();

        let title = if search_buffer.is_empty() {
            format!("Incoming queue ({})", self.queue.len())
        } else {
            format!("Incoming queue ({}) · filter '{}'", self.queue.len(), search_buffer)
        };

        if rows.is_empty() {
            let empty = Paragraph::new("No active referrals for this facility today.")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(empty, area);
            return;
        }

        let widths = [
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(11),
            Constraint::Length(7),
            Constraint::Min(14),
            Constraint::Length(8),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(table, area);
    }

    fn render_analytics(&self, frame: &mut Frame, area: Rect) {
        let Some(a) = &self.analytics else {
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Length(10), Constraint::Min(8)])
            .split(area);

        let critical_color = if a.flow.critical_load_pct >= 40.0 {
            Color::Red
        } else if a.flow.critical_load_pct >= 25.0 {
            Color::Yellow
        } else {
            Color::Green
        };
        let kpis = Paragraph::new(Line::from(vec![
            label("Decision→Dispatch: "),
            value(format_minutes(a.flow.decision_to_dispatch_min), Color::White),
            Span::raw(" | "),
            label("Dispatch→Arrival: "),
            value(format_minutes(a.flow.dispatch_to_arrival_min), Color::White),
            Span::raw(" | "),
            label("Arrival→Handover: "),
            value(format_minutes(a.flow.arrival_to_handover_min), Color::White),
            Span::raw(" | "),
            label("Critical load: "),
            value(format!("{:.0}% RED", a.flow.critical_load_pct), critical_color),
            Span::raw(" | "),
            label("Avg ETA: "),
            value(format!("{:.1} min", a.kpis.avg_eta_min), Color::White),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Flow (medians)"));
        frame.render_widget(kpis, chunks[0]);

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(35),
                Constraint::Percentage(35),
            ])
            .split(chunks[1]);

        let total = a.kpis.total.max(1) as f64;
        let bar = |count: usize| "█".repeat(((count as f64 / total) * 20.0).round() as usize);

        let triage_lines: Vec<Line> = a
            .triage_mix
            .iter()
            .map(|b| {
                Line::from(vec![
                    Span::styled(format!("{:<7}", b.key.to_string()), Style::default().fg(triage_color(b.key))),
                    Span::styled(bar(b.count), Style::default().fg(triage_color(b.key))),
                    Span::raw(format!(" {}", b.count)),
                ])
            })
            .collect();
        frame.render_widget(
            Paragraph::new(triage_lines).block(Block::default().borders(Borders::ALL).title("Triage mix")),
            middle[0],
        );

        let case_lines: Vec<Line> = a
            .case_types
            .iter()
            .map(|b| {
                Line::from(vec![
                    Span::raw(format!("{:<9}", b.key.to_string())),
                    Span::styled(bar(b.count), Style::default().fg(Color::Cyan)),
                    Span::raw(format!(" {}", b.count)),
                ])
            })
            .collect();
        frame.render_widget(
            Paragraph::new(case_lines).block(Block::default().borders(Borders::ALL).title("Case types")),
            middle[1],
        );

        let mut status_lines: Vec<Line> = a
            .status_snapshot
            .iter()
            .map(|b| {
                Line::from(vec![
                    Span::styled(format!("{:<12}", b.key.to_string()), Style::default().fg(status_color(b.key))),
                    Span::raw(b.count.to_string()),
                ])
            })
            .collect();
        status_lines.push(Line::from(""));
        status_lines.push(Line::from(vec![
            label("Accepted/progressed: "),
            value(a.accepted_or_progressed.to_string(), Color::Green),
            Span::raw("  "),
            label("Rejected: "),
            value(a.rejected.to_string(), Color::Red),
        ]));
        frame.render_widget(
            Paragraph::new(status_lines).block(Block::default().borders(Borders::ALL).title("Status snapshot")),
            middle[2],
        );

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[2]);

        let hour_labels: Vec<String> = a.hourly_flow.iter().map(|b| format!("{:02}", b.key)).collect();
        let hourly: Vec<(&str, u64)> = hour_labels
            .iter()
            .zip(&a.hourly_flow)
            .map(|(label, b)| (label.as_str(), b.count as u64))
            .collect();
        let chart = BarChart::default()
            .block(Block::default().borders(Borders::ALL).title("Hourly flow (first contact)"))
            .data(&hourly[..])
            .bar_width(2)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Cyan))
            .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
        frame.render_widget(chart, bottom[0]);

        let header = Row::new(vec!["Ambulance", "n", "Min", "Q1", "Median", "Q3", "Max"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        let rows: Vec<Row> = a
            .transport_by_ambulance
            .iter()
            .map(|t| {
                let m = &t.minutes;
                Row::new(vec![
                    t.ambulance.to_string(),
                    m.count.to_string(),
                    format!("{:.0}", m.min),
                    format!("{:.1}", m.q1),
                    format!("{:.1}", m.median),
                    format!("{:.1}", m.q3),
                    format!("{:.0}", m.max),
                ])
            })
            .collect();
        let widths = [
            Constraint::Length(11),
            Constraint::Length(4),
            Constraint::Length(5),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Length(5),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Transport minutes (dispatch→arrival)"));
        frame.render_widget(table, bottom[1]);
    }

    fn render_events(&self, frame: &mut Frame, area: Rect) {
        let header = Row::new(vec!["#", "Time", "Type", "Case", "Actor", "Payload"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let rows: Vec<Row> = self
            .events
            .iter()
            .map(|e| {
                let color = match e.kind.as_str() {
                    "REJECTED" => Color::Red,
                    "ACCEPTED" | "HANDOVER" => Color::Green,
                    "ENROUTE" | "ARRIVE_DEST" => Color::Yellow,
                    "DAY_SEEDED" | "ICU_UPDATED" => Color::Magenta,
                    _ => Color::Cyan,
                };
                Row::new(vec![
                    Cell::from(e.id.to_string()),
                    Cell::from(format_timestamp(e.ts)),
                    Cell::from(Span::styled(e.kind.clone(), Style::default().fg(color))),
                    Cell::from(if e.case_id.is_empty() { "—".to_string() } else { e.case_id.clone() }),
                    Cell::from(e.actor.clone()),
                    Cell::from(truncate_string(&e.payload.to_string(), 60)),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(6),
            Constraint::Length(20),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(18),
            Constraint::Min(20),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!("Event log ({} recent)", self.events.len())));
        frame.render_widget(table, area);
    }

    fn render_facility(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(6)])
            .split(area);

        let header = Row::new(vec!["", "Facility", "ICU beds open", "Acceptance rate"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let rows: Vec<Row> = self
            .facilities
            .iter()
            .map(|(name, meta)| {
                let current = *name == self.facility;
                let style = if current {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    if current { "▶".to_string() } else { String::new() },
                    name.clone(),
                    meta.icu_open.to_string(),
                    format!("{:.0}%", meta.acceptance_rate * 100.0),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(2),
            Constraint::Min(30),
            Constraint::Length(14),
            Constraint::Length(16),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Receiving facilities"));
        frame.render_widget(table, chunks[0]);

        let help = Paragraph::new(vec![
            Line::from("  [f] / [F]   Next / previous facility"),
            Line::from("  [+] / [-]   Adjust ICU beds open for the selected facility"),
            Line::from("  [n]         New day load (reseeds today's referrals from the clock)"),
            Line::from("  [r]         Reload the snapshot from disk"),
        ])
        .block(Block::default().borders(Borders::ALL).title("Resources"));
        frame.render_widget(help, chunks[1]);
    }

    fn render_detail(&self, frame: &mut Frame, r: &Referral, status_message: Option<&str>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(7),
                Constraint::Length(3),
            ])
            .split(frame.size());

        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                format!("{} ", r.id),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{} · {}{} · {} ", r.patient.name, r.patient.age, sex_initial(r), r.patient.id)),
            Span::styled(
                format!("● {} ", r.triage_color()),
                Style::default().fg(triage_color(r.triage_color())).add_modifier(Modifier::BOLD),
            ),
            Span::styled(r.status.to_string(), Style::default().fg(status_color(r.status)).add_modifier(Modifier::BOLD)),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(chunks[1]);

        // Timeline and audit log
        let t = &r.times;
        let mut left = vec![
            section("Timeline"),
            Line::from(vec![label("  First contact  "), Span::raw(format_clock(t.first_contact_ts))]),
            Line::from(vec![label("  Decision       "), Span::raw(format_clock(t.decision_ts))]),
            Line::from(vec![label("  Dispatch       "), Span::raw(format_clock(t.dispatch_ts))]),
            Line::from(vec![label("  En route       "), Span::raw(format_clock(t.enroute_ts))]),
            Line::from(vec![label("  Arrived        "), Span::raw(format_clock(t.arrive_dest_ts))]),
            Line::from(vec![label("  Handover       "), Span::raw(format_clock(t.handover_ts))]),
            Line::from(""),
            section("Audit"),
        ];
        if r.audit_log.is_empty() {
            left.push(Line::from(Span::styled("  No actions yet", Style::default().fg(Color::DarkGray))));
        }
        for entry in &r.audit_log {
            let mut spans = vec![
                label("  "),
                Span::raw(format_clock(Some(entry.ts))),
                Span::raw("  "),
                Span::styled(entry.action.clone(), Style::default().fg(Color::Cyan)),
            ];
            if let Some(reason) = &entry.reason {
                spans.push(Span::styled(format!(" ({})", reason), Style::default().fg(Color::Red)));
            }
            left.push(Line::from(spans));
        }
        frame.render_widget(
            Paragraph::new(left)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Case")),
            body[0],
        );

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(10), Constraint::Min(3)])
            .split(body[1]);

        let header = Row::new(vec!["Time", "HR", "SBP", "RR", "SpO2", "Temp", "AVPU"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        let rows: Vec<Row> = recent_vitals(r)
            .iter()
            .map(|v| {
                Row::new(vec![
                    format_clock(Some(v.timestamp)),
                    v.hr.to_string(),
                    v.sbp.to_string(),
                    v.rr.to_string(),
                    v.spo2.to_string(),
                    format!("{:.1}", v.temp),
                    v.avpu.to_string(),
                ])
            })
            .collect();
        let widths = [
            Constraint::Length(6),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
        ];
        let title = if r.vitals_history.is_empty() {
            "Vitals (none recorded, triage values in ISBAR)".to_string()
        } else {
            format!("Vitals (last {} of {})", recent_vitals(r).len(), r.vitals_history.len())
        };
        frame.render_widget(
            Table::new(rows, widths)
                .header(header)
                .block(Block::default().borders(Borders::ALL).title(title)),
            right[0],
        );

        let interventions: Vec<Line> = if r.interventions.is_empty() {
            vec![Line::from(Span::styled("  None recorded", Style::default().fg(Color::DarkGray)))]
        } else {
            r.interventions
                .iter()
                .map(|i| {
                    Line::from(vec![
                        label("  "),
                        Span::raw(format_clock(Some(i.timestamp))),
                        Span::raw("  "),
                        Span::styled(i.name.clone(), Style::default().fg(Color::Green)),
                        Span::styled(format!(" ({}, {})", i.kind, i.status), Style::default().fg(Color::DarkGray)),
                    ])
                })
                .collect()
        };
        frame.render_widget(
            Paragraph::new(interventions).block(Block::default().borders(Borders::ALL).title("Interventions")),
            right[1],
        );

        let report: Vec<Line> = isbar::generate(r).lines().map(|l| Line::from(l.to_string())).collect();
        frame.render_widget(
            Paragraph::new(report)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("ISBAR handover")),
            chunks[2],
        );

        let footer_text = status_message
            .map(str::to_string)
            .unwrap_or_else(|| "[a]ccept [e]n route arri[v]ed [h]andover re[x]ect | [t] Vitals | [i] Interventions | [Esc] Back".to_string());
        frame.render_widget(
            Paragraph::new(footer_text)
                .alignment(Alignment::Center)
                .style(if status_message.is_some() {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                })
                .block(Block::default().borders(Borders::ALL)),
            chunks[3],
        );
    }

    fn render_dialog(&self, frame: &mut Frame, dialog: &Dialog) {
        let selected = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

        let (title, lines, height) = match dialog {
            Dialog::Reject { id, selected: idx } => {
                let mut lines = vec![Line::from(format!("Reason for rejecting {}:", id)), Line::from("")];
                for (i, reason) in RejectReason::all().iter().enumerate() {
                    let marker = if i == *idx { "▶ " } else { "  " };
                    let style = if i == *idx { selected } else { Style::default() };
                    lines.push(Line::from(Span::styled(format!("{}{}", marker, reason), style)));
                }
                lines.push(Line::from(""));
                lines.push(Line::from(label("[↑↓] Choose | [Enter] Reject | [Esc] Cancel")));
                ("Reject referral", lines, 13)
            }
            Dialog::Vitals { id, form } => {
                let mut lines = vec![Line::from(format!("New vitals for {}:", id)), Line::from("")];
                for (i, field) in VITALS_FIELDS.iter().enumerate() {
                    let active = i == form.active;
                    lines.push(Line::from(vec![
                        Span::styled(format!("  {:<9}", field), if active { selected } else { Style::default().fg(Color::Gray) }),
                        Span::styled(
                            format!("{}{}", form.values[i], if active { "_" } else { "" }),
                            if active { selected } else { Style::default() },
                        ),
                    ]));
                }
                lines.push(Line::from(""));
                lines.push(Line::from(label("[Tab/↑↓] Field | [Enter] Save | [Esc] Cancel")));
                ("Record vitals", lines, 13)
            }
            Dialog::Interventions { id, picker } => {
                let mut lines = vec![Line::from(format!("Interventions for {}:", id)), Line::from("")];
                for (i, name) in QUICK_INTERVENTIONS.iter().enumerate() {
                    let mark = if picker.checked.get(i).copied().unwrap_or(false) { "[x]" } else { "[ ]" };
                    let style = if i == picker.cursor { selected } else { Style::default() };
                    lines.push(Line::from(Span::styled(format!("  {} {}", mark, name), style)));
                }
                let style = if picker.on_custom_row() { selected } else { Style::default() };
                lines.push(Line::from(Span::styled(
                    format!("  Other: {}{}", picker.custom, if picker.on_custom_row() { "_" } else { "" }),
                    style,
                )));
                lines.push(Line::from(""));
                lines.push(Line::from(label("[↑↓] Move | [Space] Toggle | [Enter] Save | [Esc] Cancel")));
                ("Record interventions", lines, 15)
            }
        };

        let area = centered(frame.size(), 64, height);
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .style(Style::default().bg(Color::Black)),
        );
        frame.render_widget(widget, area);
    }

    fn render_help(&self, frame: &mut Frame, current_screen: Screen) {
        let area = centered(frame.size(), 76, 28);

        let mut help_text = vec![
            Line::from(Span::styled(
                "Receiving Desk - Keyboard Shortcuts",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            section("Global Navigation:"),
            Line::from("  [1-4]          Jump to screen (1=Queue, 2=Analytics, 3=Events, 4=Facility)"),
            Line::from("  [Tab] / [→]    Next screen, [Shift-Tab] / [←] previous"),
            Line::from("  [f] / [F]      Next / previous facility"),
            Line::from("  [r]            Reload snapshot"),
            Line::from("  [?] / [F1]     Toggle this help screen"),
            Line::from("  [q] / [Esc]    Quit (Esc closes views first)"),
            Line::from(""),
        ];

        match current_screen {
            Screen::Queue => {
                help_text.push(section("Queue Screen:"));
                help_text.push(Line::from("  [↑↓]           Select referral"));
                help_text.push(Line::from("  [Enter]        Detail view with timeline, vitals and ISBAR"));
                help_text.push(Line::from("  [a]            Accept"));
                help_text.push(Line::from("  [e]            Mark en route"));
                help_text.push(Line::from("  [v]            Mark arrived"));
                help_text.push(Line::from("  [h]            Handover"));
                help_text.push(Line::from("  [x]            Reject (pick a reason)"));
                help_text.push(Line::from("  [t]            Record vitals"));
                help_text.push(Line::from("  [i]            Record interventions"));
                help_text.push(Line::from("  [/]            Search by patient, id, referrer or complaint"));
            }
            Screen::Analytics => {
                help_text.push(section("Analytics Screen:"));
                help_text.push(Line::from("  Same-day figures for the selected facility; updates live."));
            }
            Screen::Events => {
                help_text.push(section("Events Screen:"));
                help_text.push(Line::from("  Most recent event log entries, newest first."));
                help_text.push(Line::from("  Changes made by other desks reload the snapshot automatically."));
            }
            Screen::Facility => {
                help_text.push(section("Facility Screen:"));
                help_text.push(Line::from("  [+] / [-]      Adjust ICU beds open"));
                help_text.push(Line::from("  [n]            New day load"));
            }
        }

        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_text)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help")
                    .style(Style::default().bg(Color::Black)),
            );
        frame.render_widget(help, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{InterventionPicker, VitalsForm};
    use crate::core::analytics;
    use crate::core::referral::tests::sample_referral;
    use chrono::Utc;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn dashboard() -> Dashboard {
        let a = sample_referral("AAAA1111", Status::Prealert);
        let b = sample_referral("BBBB2222", Status::Enroute);
        let mut dashboard = Dashboard::new();
        dashboard.update_facility(
            "Civil Hospital Shillong".to_string(),
            vec![("Civil Hospital Shillong".to_string(), FacilityMeta { icu_open: 3, acceptance_rate: 0.8 })],
        );
        dashboard.update_analytics(analytics::compute(&[&a, &b], 3, Utc::now()));
        dashboard.update_queue(vec![a, b]);
        dashboard
    }

    #[test]
    fn test_every_screen_renders() {
        let dashboard = dashboard();
        for screen in Screen::all() {
            let mut terminal = Terminal::new(TestBackend::new(160, 48)).unwrap();
            terminal
                .draw(|f| dashboard.render(f, *screen, 0, None, false, false, "", None, None))
                .unwrap();
            let text = screen_text(&terminal);
            assert!(text.contains("Civil Hospital Shillong"));
            assert!(text.contains(screen.title()));
        }
    }

    #[test]
    fn test_queue_shows_referrals() {
        let dashboard = dashboard();
        let mut terminal = Terminal::new(TestBackend::new(160, 40)).unwrap();
        terminal
            .draw(|f| dashboard.render(f, Screen::Queue, 1, None, false, false, "", None, None))
            .unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("AAAA1111"));
        assert!(text.contains("BBBB2222"));
        assert!(text.contains("Incoming queue (2)"));
    }

    #[test]
    fn test_detail_and_dialogs_render() {
        let dashboard = dashboard();
        let referral = sample_referral("AAAA1111", Status::Accepted);
        let dialogs = [
            Dialog::Reject { id: referral.id.clone(), selected: 2 },
            Dialog::Vitals { id: referral.id.clone(), form: VitalsForm::prefilled(&referral) },
            Dialog::Interventions { id: referral.id.clone(), picker: InterventionPicker::new() },
        ];

        for dialog in &dialogs {
            let mut terminal = Terminal::new(TestBackend::new(140, 44)).unwrap();
            terminal
                .draw(|f| {
                    dashboard.render(f, Screen::Queue, 0, None, false, false, "", Some(&referral), Some(dialog))
                })
                .unwrap();
            let text = screen_text(&terminal);
            assert!(text.contains("ISBAR handover"));
            assert!(text.contains("AAAA1111"));
        }
    }
}
