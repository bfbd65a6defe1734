//! Agents View - health of agents across every rig
//!
//! One section per rig. Rigs whose agent list came from a failed fallback
//! load show the error in place of (or above) their agents.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::models::{Agent, AgentState, ItemList};
use crate::source::Resource;

/// Agent list of one rig
#[derive(Debug, Clone)]
pub struct RigAgents {
    pub rig: String,
    pub agents: Resource<ItemList<Agent>>,
}

/// State for the Agents view
pub struct AgentsView {
    /// Sections in rig catalog order
    pub rigs: Vec<RigAgents>,
    /// Selected line index
    pub selected: usize,
    list_state: ListState,
}

impl Default for AgentsView {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentsView {
    pub fn new() -> Self {
        Self {
            rigs: Vec::new(),
            selected: 0,
            list_state: ListState::default(),
        }
    }

    /// Replace one rig's section, adding it if new. A failed load without
    /// data keeps the agents already shown.
    pub fn update_rig(&mut self, rig: &str, agents: Resource<ItemList<Agent>>) {
        match self.rigs.iter_mut().find(|section| section.rig == rig) {
            Some(section) => {
                let previous = section.agents.data.take();
                section.agents = Resource {
                    data: agents.data.or(previous),
                    ..agents
                };
            }
            None => self.rigs.push(RigAgents {
                rig: rig.to_string(),
                agents,
            }),
        }
    }

    /// Drop sections for rigs no longer in the catalog.
    pub fn retain_rigs(&mut self, rigs: &[String]) {
        self.rigs.retain(|section| rigs.contains(&section.rig));
        self.selected = self.selected.min(self.line_count().saturating_sub(1));
    }

    /// Whether any section offers a retry.
    pub fn has_errors(&self) -> bool {
        self.rigs.iter().any(|section| section.agents.error.is_some())
    }

    fn line_count(&self) -> usize {
        self.rigs
            .iter()
            .map(|section| 1 + section.agents.data.as_ref().map_or(0, |agents| agents.len()))
            .sum()
    }

    pub fn total_agents(&self) -> usize {
        self.rigs
            .iter()
            .filter_map(|section| section.agents.data.as_ref())
            .map(|agents| agents.len())
            .sum()
    }

    /// Move selection down
    pub fn select_next(&mut self) {
        let count = self.line_count();
        if count == 0 {
            return;
        }
        self.selected = (self.selected + 1).min(count - 1);
    }

    /// Move selection up
    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Jump to top
    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    /// Jump to bottom
    pub fn select_last(&mut self) {
        self.selected = self.line_count().saturating_sub(1);
    }

    /// Render the view
    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Agents ({}) ", self.total_agents()));

        if self.rigs.is_empty() {
            let empty = Paragraph::new("Loading agents...")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let mut items: Vec<ListItem> = Vec::new();
        for section in &self.rigs {
            let count = section.agents.data.as_ref().map_or(0, |agents| agents.len());
            let mut header = vec![Span::styled(
                format!(" {} ({})", section.rig, count),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )];
            if let Some(error) = &section.agents.error {
                let (label, color) = if section.agents.stale {
                    ("cached", Color::Yellow)
                } else {
                    ("error", Color::Red)
                };
                header.push(Span::styled(
                    format!("  [{}] {}  (r: retry)", label, error),
                    Style::default().fg(color),
                ));
            }
            items.push(ListItem::new(Line::from(header)));

            if let Some(agents) = &section.agents.data {
                for agent in agents.iter() {
                    items.push(ListItem::new(agent_line(agent)));
                }
            }
        }

        let selected = self.selected.min(items.len().saturating_sub(1));
        let items: Vec<ListItem> = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                if idx == selected {
                    item.style(Style::default().bg(Color::DarkGray))
                } else {
                    item
                }
            })
            .collect();
        self.list_state.select(Some(selected));
        frame.render_stateful_widget(List::new(items).block(block), area, &mut self.list_state);
    }
}

fn state_indicator(state: AgentState) -> (&'static str, Color) {
    match state {
        AgentState::Working => ("●", Color::Green),
        AgentState::Idle => ("○", Color::Blue),
        AgentState::Stuck => ("!", Color::Red),
        AgentState::Stopped => ("■", Color::DarkGray),
        AgentState::Unknown => ("?", Color::DarkGray),
    }
}

fn agent_line(agent: &Agent) -> Line<'static> {
    let (icon, color) = state_indicator(agent.state);
    let hooked = agent
        .hooked_issue
        .as_deref()
        .map(|id| format!("  → {}", id))
        .unwrap_or_default();
    Line::from(vec![
        Span::styled(format!("   {} ", icon), Style::default().fg(color)),
        Span::raw(format!("{:<16}", agent.name)),
        Span::styled(
            format!("{:<10}", agent.role.as_deref().unwrap_or("-")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("{:<8}", agent.state.as_str()), Style::default().fg(color)),
        Span::styled(hooked, Style::default().fg(Color::Blue)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataOrigin;
    use chrono::Utc;
    use std::sync::Arc;

    fn agent(name: &str, state: AgentState) -> Agent {
        Agent {
            address: format!("gastown/polecats/{}", name),
            name: name.to_string(),
            rig: "gastown".to_string(),
            role: Some("polecat".to_string()),
            state,
            hooked_issue: None,
            updated_at: Utc::now(),
        }
    }

    fn agents(list: Vec<Agent>) -> Resource<ItemList<Agent>> {
        Resource::live(Arc::new(list.into_iter().map(Arc::new).collect()))
    }

    #[test]
    fn test_update_rig_keeps_order_and_replaces() {
        let mut view = AgentsView::new();
        view.update_rig("gastown", agents(vec![agent("nux", AgentState::Working)]));
        view.update_rig("beads", agents(vec![]));
        view.update_rig(
            "gastown",
            agents(vec![
                agent("nux", AgentState::Idle),
                agent("toast", AgentState::Stuck),
            ]),
        );
        let rigs: Vec<&str> = view.rigs.iter().map(|s| s.rig.as_str()).collect();
        assert_eq!(rigs, vec!["gastown", "beads"]);
        assert_eq!(view.total_agents(), 2);
    }

    #[test]
    fn test_failed_update_keeps_previous_agents() {
        let mut view = AgentsView::new();
        view.update_rig("gastown", agents(vec![agent("nux", AgentState::Working)]));
        view.update_rig(
            "gastown",
            Resource {
                data: None,
                error: Some("Network error: refused".to_string()),
                stale: false,
                origin: DataOrigin::Fallback,
            },
        );
        assert_eq!(view.total_agents(), 1);
        assert!(view.has_errors());
    }

    #[test]
    fn test_selection_bounds() {
        let mut view = AgentsView::new();
        view.update_rig("gastown", agents(vec![agent("nux", AgentState::Working)]));
        view.select_last();
        assert_eq!(view.selected, 1);
        view.select_next();
        assert_eq!(view.selected, 1);
        view.retain_rigs(&[]);
        assert_eq!(view.selected, 0);
    }
}
