// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::debug;

use crate::{
    ApiError, EditField, Lead, LeadId, ReconciliationPolicy, RowActionKind, RowCap, Stage, Task,
    ViewKind, ViewScope,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    TaskSelect,
    StageSelect,
    Action(RowActionKind),
}

/// An interactive element inside a row. Every control carries the id of the
/// lead it belongs to; that id is the only addressing the mutation handlers
/// use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowControl {
    pub kind: ControlKind,
    pub lead_id: LeadId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub lead_id: LeadId,
    pub im: String,
    pub company_name: String,
    pub agent_name: String,
    pub email: String,
    pub action_date: String,
    pub task: Task,
    pub stage: Option<Stage>,
    pub controls: Vec<RowControl>,
    pub exiting: bool,
}

impl RowView {
    pub fn render(lead: &Lead, actions: &[RowActionKind]) -> Self {
        let mut controls = vec![
            RowControl {
                kind: ControlKind::TaskSelect,
                lead_id: lead.id.clone(),
            },
            RowControl {
                kind: ControlKind::StageSelect,
                lead_id: lead.id.clone(),
            },
        ];
        controls.extend(actions.iter().map(|action| RowControl {
            kind: ControlKind::Action(*action),
            lead_id: lead.id.clone(),
        }));

        Self {
            lead_id: lead.id.clone(),
            im: lead.im.clone(),
            company_name: lead.company_name.clone(),
            agent_name: lead.agent_name.clone(),
            email: lead.email.clone(),
            action_date: lead.action_date.as_str().to_owned(),
            task: lead.task,
            stage: lead.stage,
            controls,
            exiting: false,
        }
    }

    pub fn control(&self, kind: ControlKind) -> Option<&RowControl> {
        self.controls.iter().find(|control| control.kind == kind)
    }
}

/// A row taken out of the container during an optimistic removal, together
/// with the sibling it sat in front of when the removal began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedRow {
    pub row: RowView,
    pub next_sibling: Option<LeadId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reinsertion {
    BeforeSibling(usize),
    Appended(usize),
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableController {
    view: ViewKind,
    snapshot: Vec<Lead>,
    rows: Vec<RowView>,
    generation: u64,
}

impl TableController {
    pub fn new(view: ViewKind) -> Self {
        Self {
            view,
            snapshot: Vec::new(),
            rows: Vec::new(),
            generation: 0,
        }
    }

    pub const fn view(&self) -> ViewKind {
        self.view
    }

    pub const fn scope(&self) -> ViewScope {
        self.view.scope()
    }

    pub const fn policy(&self) -> ReconciliationPolicy {
        self.view.policy()
    }

    pub const fn cap(&self) -> RowCap {
        self.view.row_cap()
    }

    pub fn rows(&self) -> &[RowView] {
        &self.rows
    }

    pub fn snapshot(&self) -> &[Lead] {
        &self.snapshot
    }

    /// Bumped on every full render; work scheduled against an older
    /// generation must not touch the current rows.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn row(&self, lead_id: &LeadId) -> Option<&RowView> {
        self.rows.iter().find(|row| &row.lead_id == lead_id)
    }

    pub fn row_index(&self, lead_id: &LeadId) -> Option<usize> {
        self.rows.iter().position(|row| &row.lead_id == lead_id)
    }

    /// Applies a fetch result. A failed fetch propagates and leaves the
    /// previous render in place.
    pub fn apply_fetch(&mut self, fetched: Result<Vec<Lead>, ApiError>) -> Result<(), ApiError> {
        let leads = fetched?;
        self.replace_snapshot(leads);
        Ok(())
    }

    pub fn replace_snapshot(&mut self, mut leads: Vec<Lead>) {
        sort_by_action_date_desc(&mut leads);
        self.snapshot = leads;
        self.render();
    }

    fn render(&mut self) {
        let visible = self.cap().visible(self.snapshot.len());
        let actions = self.view.actions();
        self.rows = self.snapshot[..visible]
            .iter()
            .map(|lead| RowView::render(lead, actions))
            .collect();
        self.generation += 1;
        debug!(
            view = self.view.label(),
            rows = self.rows.len(),
            fetched = self.snapshot.len(),
            generation = self.generation,
            "table rendered"
        );
    }

    /// Mirrors a native selector: the control shows the user's choice as
    /// soon as it is made, independent of the request outcome.
    pub fn set_task(&mut self, lead_id: &LeadId, task: Task) -> bool {
        match self.rows.iter_mut().find(|row| &row.lead_id == lead_id) {
            Some(row) => {
                row.task = task;
                true
            }
            None => false,
        }
    }

    pub fn set_stage(&mut self, lead_id: &LeadId, stage: Stage) -> bool {
        match self.rows.iter_mut().find(|row| &row.lead_id == lead_id) {
            Some(row) => {
                row.stage = Some(stage);
                true
            }
            None => false,
        }
    }

    /// `None` when the row is absent or its stage selector shows no choice.
    pub fn selector_value(&self, lead_id: &LeadId, field: EditField) -> Option<&'static str> {
        self.row(lead_id).and_then(|row| match field {
            EditField::Task => Some(row.task.as_str()),
            EditField::Stage => row.stage.map(Stage::as_str),
        })
    }

    /// Flags the row as exiting and returns the id of its next sibling,
    /// captured before anything else changes. `None` when the row is absent
    /// or already on its way out.
    pub fn begin_exit(&mut self, lead_id: &LeadId) -> Option<Option<LeadId>> {
        let index = self.row_index(lead_id)?;
        if self.rows[index].exiting {
            return None;
        }
        self.rows[index].exiting = true;
        Some(self.rows.get(index + 1).map(|row| row.lead_id.clone()))
    }

    pub fn clear_exit(&mut self, lead_id: &LeadId) -> bool {
        match self.rows.iter_mut().find(|row| &row.lead_id == lead_id) {
            Some(row) if row.exiting => {
                row.exiting = false;
                true
            }
            _ => false,
        }
    }

    pub fn detach(&mut self, lead_id: &LeadId, next_sibling: Option<LeadId>) -> Option<DetachedRow> {
        let index = self.row_index(lead_id)?;
        if !self.rows[index].exiting {
            return None;
        }
        let row = self.rows.remove(index);
        Some(DetachedRow { row, next_sibling })
    }

    pub fn reinsert(&mut self, detached: DetachedRow) -> Reinsertion {
        let DetachedRow {
            mut row,
            next_sibling,
        } = detached;
        if self.row_index(&row.lead_id).is_some() {
            return Reinsertion::AlreadyPresent;
        }
        row.exiting = false;

        let anchor = next_sibling
            .as_ref()
            .and_then(|sibling| self.row_index(sibling));
        match anchor {
            Some(index) => {
                self.rows.insert(index, row);
                Reinsertion::BeforeSibling(index)
            }
            None => {
                self.rows.push(row);
                Reinsertion::Appended(self.rows.len() - 1)
            }
        }
    }
}

pub fn sort_by_action_date_desc(leads: &mut [Lead]) {
    leads.sort_by(|left, right| left.action_date.cmp_descending(&right.action_date));
}

#[cfg(test)]
mod tests {
    use super::{ControlKind, Reinsertion, TableController, sort_by_action_date_desc};
    use crate::{
        ActionDate, ApiError, Lead, LeadId, RowActionKind, Stage, Task, ViewKind,
    };

    fn lead(id: &str, date: &str) -> Lead {
        Lead {
            id: LeadId::new(id),
            im: format!("IM-{id}"),
            company_name: format!("{id} Co"),
            agent_name: "Avery Walker".to_owned(),
            email: format!("{id}@example.test"),
            task: Task::Contact,
            stage: Some(Stage::New),
            action_date: ActionDate::new(date),
        }
    }

    fn ids(table: &TableController) -> Vec<&str> {
        table.rows().iter().map(|row| row.lead_id.as_str()).collect()
    }

    #[test]
    fn render_sorts_most_future_first() {
        let mut table = TableController::new(ViewKind::LeadsPage);
        table.replace_snapshot(vec![
            lead("a", "2026-01-05"),
            lead("b", "2026-03-01T08:00"),
            lead("c", "2026-02-10"),
        ]);
        assert_eq!(ids(&table), vec!["b", "c", "a"]);
    }

    #[test]
    fn sort_is_stable_for_equal_dates() {
        let mut leads = vec![
            lead("first", "2026-01-01"),
            lead("second", "2026-01-01"),
            lead("later", "2026-06-01"),
        ];
        sort_by_action_date_desc(&mut leads);
        let order = leads.iter().map(|lead| lead.id.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["later", "first", "second"]);
    }

    #[test]
    fn dashboard_caps_rows_after_sorting() {
        let mut table = TableController::new(ViewKind::Dashboard);
        let leads = (1..=8)
            .map(|day| lead(&format!("l{day}"), &format!("2026-01-0{day}")))
            .collect::<Vec<_>>();
        table.replace_snapshot(leads);
        assert_eq!(ids(&table), vec!["l8", "l7", "l6", "l5", "l4"]);
        assert_eq!(table.snapshot().len(), 8);
    }

    #[test]
    fn leads_page_renders_every_row() {
        let mut table = TableController::new(ViewKind::LeadsPage);
        let leads = (0..12)
            .map(|index| lead(&format!("l{index}"), "2026-01-01"))
            .collect::<Vec<_>>();
        table.replace_snapshot(leads);
        assert_eq!(table.rows().len(), 12);
    }

    #[test]
    fn every_control_carries_the_row_lead_id() {
        let mut table = TableController::new(ViewKind::Dashboard);
        table.replace_snapshot(vec![lead("x1", "2026-01-01")]);
        let row = &table.rows()[0];
        let kinds = row
            .controls
            .iter()
            .map(|control| control.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ControlKind::TaskSelect,
                ControlKind::StageSelect,
                ControlKind::Action(RowActionKind::Complete),
                ControlKind::Action(RowActionKind::Reschedule),
            ]
        );
        assert!(row.controls.iter().all(|control| control.lead_id == row.lead_id));
    }

    #[test]
    fn failed_fetch_keeps_previous_render() {
        let mut table = TableController::new(ViewKind::LeadsPage);
        table.replace_snapshot(vec![lead("keep", "2026-01-01")]);
        let generation = table.generation();

        let result = table.apply_fetch(Err(ApiError::Status {
            status: 500,
            message: "boom".to_owned(),
        }));
        assert!(result.is_err());
        assert_eq!(ids(&table), vec!["keep"]);
        assert_eq!(table.generation(), generation);
    }

    #[test]
    fn reload_with_same_snapshot_is_idempotent() {
        let leads = vec![lead("a", "2026-01-01"), lead("b", "2026-02-01")];
        let mut table = TableController::new(ViewKind::Dashboard);
        table.replace_snapshot(leads.clone());
        let first = table.rows().to_vec();
        table.replace_snapshot(leads);
        assert_eq!(table.rows(), first.as_slice());
    }

    #[test]
    fn reinsert_goes_before_captured_sibling() {
        let mut table = TableController::new(ViewKind::LeadsPage);
        table.replace_snapshot(vec![
            lead("a", "2026-04-01"),
            lead("b", "2026-03-01"),
            lead("c", "2026-02-01"),
        ]);
        let b = LeadId::new("b");
        let sibling = table.begin_exit(&b).expect("row b present");
        assert_eq!(sibling, Some(LeadId::new("c")));
        let detached = table.detach(&b, sibling).expect("b is exiting");
        assert_eq!(ids(&table), vec!["a", "c"]);

        assert_eq!(table.reinsert(detached), Reinsertion::BeforeSibling(1));
        assert_eq!(ids(&table), vec!["a", "b", "c"]);
        assert!(!table.rows()[1].exiting);
    }

    #[test]
    fn reinsert_appends_when_sibling_is_gone() {
        let mut table = TableController::new(ViewKind::LeadsPage);
        table.replace_snapshot(vec![
            lead("a", "2026-04-01"),
            lead("b", "2026-03-01"),
            lead("c", "2026-02-01"),
        ]);
        let a = LeadId::new("a");
        let sibling = table.begin_exit(&a).expect("row a present");
        let detached = table.detach(&a, sibling).expect("a is exiting");

        let b = LeadId::new("b");
        let b_sibling = table.begin_exit(&b).expect("row b present");
        let _gone = table.detach(&b, b_sibling).expect("b is exiting");

        assert_eq!(table.reinsert(detached), Reinsertion::Appended(1));
        assert_eq!(ids(&table), vec!["c", "a"]);
    }

    #[test]
    fn detach_requires_exiting_row() {
        let mut table = TableController::new(ViewKind::Dashboard);
        table.replace_snapshot(vec![lead("a", "2026-01-01")]);
        assert!(table.detach(&LeadId::new("a"), None).is_none());
        assert!(table.begin_exit(&LeadId::new("a")).is_some());
        assert!(table.begin_exit(&LeadId::new("a")).is_none());
    }

    #[test]
    fn reinsert_never_duplicates_a_rendered_id() {
        let mut table = TableController::new(ViewKind::Dashboard);
        table.replace_snapshot(vec![lead("a", "2026-01-01")]);
        let a = LeadId::new("a");
        let sibling = table.begin_exit(&a).expect("row a present");
        let detached = table.detach(&a, sibling).expect("a is exiting");
        table.replace_snapshot(vec![lead("a", "2026-01-01")]);

        assert_eq!(table.reinsert(detached), Reinsertion::AlreadyPresent);
        assert_eq!(ids(&table), vec!["a"]);
    }

    #[test]
    fn selector_updates_do_not_touch_snapshot() {
        let mut table = TableController::new(ViewKind::Dashboard);
        table.replace_snapshot(vec![lead("a", "2026-01-01")]);
        let a = LeadId::new("a");
        assert!(table.set_task(&a, Task::Reply));
        assert!(table.set_stage(&a, Stage::Won));
        assert_eq!(table.selector_value(&a, crate::EditField::Task), Some("reply"));
        assert_eq!(table.snapshot()[0].task, Task::Contact);
        assert!(!table.set_task(&LeadId::new("missing"), Task::Reply));
    }
}
