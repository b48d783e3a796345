use crossterm::event::KeyCode;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
};

use crate::config::{STALE_AFTER, TRANSFER_GAS_LIMIT};
use crate::data::{Chain, ChainState, ConnectionStatus, Mode, Speed, StoreState, Trend, unix_millis};
use crate::simulator::{AMOUNT_PRESETS, GAS_LIMIT_PRESETS, format_gwei, gas_cost_usd, simulate};

pub struct Dashboard {
    pub should_quit: bool,
    pub selected: Chain,
    amount_idx: usize,
    gas_limit_idx: usize,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            selected: Chain::Ethereum,
            amount_idx: 1,
            gas_limit_idx: 0,
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn amount(&self) -> f64 {
        AMOUNT_PRESETS[self.amount_idx]
    }

    pub fn gas_limit(&self) -> (&'static str, u64) {
        GAS_LIMIT_PRESETS[self.gas_limit_idx]
    }

    /// Apply a key press. Returns the mode to switch to, if any; mode changes
    /// go through the store.
    pub fn handle_key(&mut self, key: KeyCode, mode: Mode) -> Option<Mode> {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),
            KeyCode::Char('m') => return Some(mode.toggled()),
            KeyCode::Tab => self.selected = self.selected.next(),
            KeyCode::Char('1') => self.selected = Chain::Ethereum,
            KeyCode::Char('2') => self.selected = Chain::Polygon,
            KeyCode::Char('3') => self.selected = Chain::Arbitrum,
            KeyCode::Char('a') => self.amount_idx = (self.amount_idx + 1) % AMOUNT_PRESETS.len(),
            KeyCode::Char('g') => {
                self.gas_limit_idx = (self.gas_limit_idx + 1) % GAS_LIMIT_PRESETS.len()
            }
            _ => {}
        }
        None
    }

    pub fn render(&self, frame: &mut Frame, state: &StoreState) {
        let simulator_height = if state.mode == Mode::Simulation { 8 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),                // connection
                Constraint::Length(9),                // metric cards
                Constraint::Min(10),                  // chart
                Constraint::Length(simulator_height), // simulator
                Constraint::Length(3),                // help
            ])
            .split(frame.area());

        self.render_connection_status(frame, chunks[0], state);
        self.render_metrics(frame, chunks[1], state);
        self.render_chart(frame, chunks[2], state);
        if state.mode == Mode::Simulation {
            self.render_simulator(frame, chunks[3], state);
        }
        self.render_help(frame, chunks[4]);
    }

    fn render_connection_status(&self, frame: &mut Frame, area: Rect, state: &StoreState) {
        let (status_text, status_style) = match state.connection_status() {
            ConnectionStatus::Connected => ("Connected", Style::default().fg(Color::Green)),
            ConnectionStatus::Disconnected => ("Disconnected", Style::default().fg(Color::Red)),
        };
        let mode_text = match state.mode {
            Mode::Live => "Live",
            Mode::Simulation => "Simulation",
        };
        let live = state.chains().filter(|(_, c)| c.last_updated.is_some()).count();

        let content = vec![Line::from(vec![
            Span::styled("Status: ", Style::default()),
            Span::styled(status_text, status_style),
            Span::styled(" | ", Style::default()),
            Span::styled("Chains: ", Style::default()),
            Span::styled(
                format!("{}/{}", live, Chain::ALL.len()),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(" | ", Style::default()),
            Span::styled("Mode: ", Style::default()),
            Span::styled(mode_text, Style::default().fg(Color::Magenta)),
            Span::styled(" | ", Style::default()),
            Span::styled("ETH: ", Style::default()),
            Span::styled(
                format!("${:.2}", state.usd_price),
                Style::default().fg(Color::Yellow),
            ),
        ])];

        let paragraph = Paragraph::new(content)
            .block(Block::default().title("Connection").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn render_metrics(&self, frame: &mut Frame, area: Rect, state: &StoreState) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 3); 3])
            .split(area);
        for ((chain, data), column) in state.chains().zip(columns.iter()) {
            self.render_chain_card(frame, *column, chain, data, state.usd_price);
        }
    }

    fn render_chain_card(
        &self,
        frame: &mut Frame,
        area: Rect,
        chain: Chain,
        data: &ChainState,
        usd_price: f64,
    ) {
        let total = data.total_fee();
        let (speed_text, speed_style) = match chain.speed(total) {
            Speed::Fast => ("Fast", Style::default().fg(Color::Red)),
            Speed::Standard => ("Standard", Style::default().fg(Color::Yellow)),
            Speed::Slow => ("Slow", Style::default().fg(Color::Green)),
        };
        let (trend_text, trend_style) = match data.trend() {
            Trend::Up => ("Up", Style::default().fg(Color::Red)),
            Trend::Down => ("Down", Style::default().fg(Color::Green)),
            Trend::Neutral => ("Flat", Style::default().fg(Color::Gray)),
        };
        let transfer_usd = gas_cost_usd(
            data.base_fee,
            data.priority_fee,
            TRANSFER_GAS_LIMIT,
            usd_price,
        );
        let now = unix_millis();
        let updated = match data.last_updated {
            Some(ts) => format!("{}s ago", now.saturating_sub(ts) / 1000),
            None => "never".to_string(),
        };
        let updated_style = if data.is_stale(now, STALE_AFTER) {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Gray)
        };

        let lines = vec![
            Line::from(vec![
                Span::styled("Base: ", Style::default()),
                Span::styled(format_gwei(data.base_fee), Style::default().fg(Color::Cyan)),
            ]),
            Line::from(vec![
                Span::styled("Priority: ", Style::default()),
                Span::styled(
                    format_gwei(data.priority_fee),
                    Style::default().fg(Color::Magenta),
                ),
            ]),
            Line::from(vec![
                Span::styled("Total: ", Style::default()),
                Span::styled(format!("{:.3} Gwei", total), Style::default().fg(Color::White)),
            ]),
            Line::from(vec![
                Span::styled("Transfer: ", Style::default()),
                Span::styled(
                    format!("${:.4}", transfer_usd),
                    Style::default().fg(Color::Yellow),
                ),
            ]),
            Line::from(vec![
                Span::styled("Speed: ", Style::default()),
                Span::styled(speed_text, speed_style),
                Span::raw("  Trend: "),
                Span::styled(trend_text, trend_style),
            ]),
            Line::from(vec![
                Span::styled("Updated: ", Style::default()),
                Span::styled(updated, updated_style),
            ]),
        ];

        let border_style = if chain == self.selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(format!("{} ({})", chain.display_name(), chain.symbol()))
                .borders(Borders::ALL)
                .border_style(border_style),
        );
        frame.render_widget(paragraph, area);
    }

    fn render_chart(&self, frame: &mut Frame, area: Rect, state: &StoreState) {
        let chain = self.selected;
        let title = format!("{} total fee (Gwei)", chain.display_name());
        let points = state.chart_points(chain);
        let Some(newest) = points.last().map(|p| p.time) else {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                "(no data yet)",
                Style::default().fg(Color::DarkGray),
            )))
            .block(Block::default().title(title).borders(Borders::ALL));
            frame.render_widget(paragraph, area);
            return;
        };

        // x: seconds relative to the newest point
        let data: Vec<(f64, f64)> = points.iter().map(|p| (p.time - newest, p.close)).collect();
        let x_min = data.first().map(|d| d.0).unwrap_or(0.0).min(-1.0);
        let (y_min, y_max) = data
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), d| (lo.min(d.1), hi.max(d.1)));
        let pad = ((y_max - y_min) * 0.1).max(0.01);
        let (y_lo, y_hi) = ((y_min - pad).max(0.0), y_max + pad);

        let dataset = Dataset::default()
            .name(chain.as_str())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&data);

        let chart = Chart::new(vec![dataset])
            .block(Block::default().title(title).borders(Borders::ALL))
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(Color::Gray))
                    .bounds([x_min, 0.0])
                    .labels(vec![
                        Span::raw(format!("{:.0}s", x_min)),
                        Span::raw("now"),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .style(Style::default().fg(Color::Gray))
                    .bounds([y_lo, y_hi])
                    .labels(vec![
                        Span::raw(format!("{:.2}", y_lo)),
                        Span::raw(format!("{:.2}", y_hi)),
                    ]),
            );
        frame.render_widget(chart, area);
    }

    fn render_simulator(&self, frame: &mut Frame, area: Rect, state: &StoreState) {
        let (gas_label, gas_limit) = self.gas_limit();
        let sim = simulate(state, self.amount(), gas_limit);
        let cheapest = sim.cheapest().map(|c| c.chain);

        let mut lines = vec![Line::from(vec![
            Span::styled("Amount: ", Style::default()),
            Span::styled(format!("{}", self.amount()), Style::default().fg(Color::Cyan)),
            Span::raw("  |  Gas limit: "),
            Span::styled(
                format!("{} ({})", gas_limit, gas_label),
                Style::default().fg(Color::Cyan),
            ),
        ])];

        for cost in &sim.costs {
            let mut spans = vec![
                Span::styled(
                    format!("{:<9}", cost.chain.as_str()),
                    Style::default().fg(Color::White),
                ),
                Span::raw(" gas "),
                Span::styled(
                    format!("${:.4}", cost.gas_cost_usd),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw("  total "),
                Span::styled(
                    format!("${:.2}", cost.total_cost_usd),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!("  {:.3} Gwei / {:.8} {}", cost.total_gwei, cost.gas_cost_native, cost.chain.symbol()),
                    Style::default().fg(Color::Gray),
                ),
            ];
            if Some(cost.chain) == cheapest {
                spans.push(Span::styled("  Cheapest", Style::default().fg(Color::Green)));
            }
            if cost.savings_usd > 0.0 {
                spans.push(Span::styled(
                    format!("  save ${:.4}", cost.savings_usd),
                    Style::default().fg(Color::Blue),
                ));
            }
            lines.push(Line::from(spans));
        }

        lines.push(Line::from(vec![
            Span::styled("Maximum savings: ", Style::default()),
            Span::styled(
                format!("${:.6}", sim.max_savings_usd),
                Style::default().fg(Color::Green),
            ),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().title("Transaction Simulator").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let help_text = vec![Line::from(vec![
            Span::styled("'q'", Style::default().fg(Color::Yellow)),
            Span::raw(" quit  "),
            Span::styled("'m'", Style::default().fg(Color::Yellow)),
            Span::raw(" mode  "),
            Span::styled("Tab/1-3", Style::default().fg(Color::Yellow)),
            Span::raw(" chain  "),
            Span::styled("'a'", Style::default().fg(Color::Yellow)),
            Span::raw(" amount  "),
            Span::styled("'g'", Style::default().fg(Color::Yellow)),
            Span::raw(" gas limit"),
        ])];

        let paragraph =
            Paragraph::new(help_text).block(Block::default().title("Help").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeeSample;
    use ratatui::{Terminal, backend::TestBackend};

    fn rendered(dashboard: &Dashboard, state: &StoreState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|frame| dashboard.render(frame, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn populated(mode: Mode) -> StoreState {
        let mut state = StoreState::new(mode, 3500.0);
        for (i, chain) in Chain::ALL.into_iter().enumerate() {
            for t in 0..5u64 {
                let sample = FeeSample::new(t * 1_000, 10.0 * (i + 1) as f64 + t as f64, 1.0);
                state.chain_mut(chain).record(&sample, t * 1_000);
            }
        }
        state.connected = true;
        state
    }

    #[test]
    fn test_render_live() {
        let text = rendered(&Dashboard::new(), &populated(Mode::Live));
        assert!(text.contains("Connected"));
        assert!(text.contains("Ethereum (ETH)"));
        assert!(text.contains("Polygon (MATIC)"));
        assert!(text.contains("Ethereum total fee"));
        assert!(!text.contains("Transaction Simulator"));
    }

    #[test]
    fn test_render_simulation() {
        let text = rendered(&Dashboard::new(), &populated(Mode::Simulation));
        assert!(text.contains("Transaction Simulator"));
        assert!(text.contains("Cheapest"));
    }

    #[test]
    fn test_render_empty_state() {
        let text = rendered(&Dashboard::new(), &StoreState::new(Mode::Live, 3500.0));
        assert!(text.contains("Disconnected"));
        assert!(text.contains("(no data yet)"));
        assert!(text.contains("never"));
    }

    #[test]
    fn test_handle_key() {
        let mut dash = Dashboard::new();
        assert_eq!(dash.handle_key(KeyCode::Char('m'), Mode::Live), Some(Mode::Simulation));
        assert_eq!(dash.handle_key(KeyCode::Tab, Mode::Live), None);
        assert_eq!(dash.selected, Chain::Polygon);
        dash.handle_key(KeyCode::Char('3'), Mode::Live);
        assert_eq!(dash.selected, Chain::Arbitrum);

        assert_eq!(dash.amount(), 0.5);
        dash.handle_key(KeyCode::Char('a'), Mode::Live);
        assert_eq!(dash.amount(), 1.0);
        dash.handle_key(KeyCode::Char('g'), Mode::Live);
        assert_eq!(dash.gas_limit(), ("ERC20", 65_000));

        assert!(!dash.should_quit);
        dash.handle_key(KeyCode::Esc, Mode::Live);
        assert!(dash.should_quit);
    }
}
