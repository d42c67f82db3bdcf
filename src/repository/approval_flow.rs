use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use pushkind_common::repository::errors::{RepositoryError, RepositoryResult};

use crate::{
    domain::approval_flow::{
        ApprovalFlow as DomainFlow, ApprovalFlowListQuery, NewApprovalFlow as DomainNewFlow,
    },
    models::approval_flow::{
        ApprovalFlow as DbFlow, ApprovalFlowStep as DbFlowStep, NewApprovalFlow as DbNewFlow,
        NewApprovalFlowStep as DbNewFlowStep,
    },
    repository::{ApprovalFlowReader, ApprovalFlowWriter, DieselRepository},
};

fn hydrate(conn: &mut SqliteConnection, rows: Vec<DbFlow>) -> RepositoryResult<Vec<DomainFlow>> {
    use crate::schema::approval_flow_steps;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let flow_ids: Vec<i32> = rows.iter().map(|flow| flow.id).collect();

    let mut steps_by_flow: HashMap<i32, Vec<DbFlowStep>> = HashMap::new();
    for step in approval_flow_steps::table
        .filter(approval_flow_steps::flow_id.eq_any(&flow_ids))
        .order((
            approval_flow_steps::flow_id.asc(),
            approval_flow_steps::step_number.asc(),
        ))
        .load::<DbFlowStep>(conn)?
    {
        steps_by_flow.entry(step.flow_id).or_default().push(step);
    }

    Ok(rows
        .into_iter()
        .filter_map(|flow| {
            let steps = steps_by_flow.remove(&flow.id).unwrap_or_default();
            flow.into_domain(steps)
        })
        .collect())
}

fn insert_steps(
    conn: &mut SqliteConnection,
    flow_id: i32,
    flow: &DomainNewFlow,
) -> RepositoryResult<()> {
    use crate::schema::approval_flow_steps;

    if flow.steps.is_empty() {
        return Ok(());
    }

    let payload: Vec<DbNewFlowStep> = flow
        .steps
        .iter()
        .map(|step| DbNewFlowStep::from_domain(flow_id, step))
        .collect();

    diesel::insert_into(approval_flow_steps::table)
        .values(&payload)
        .execute(conn)?;

    Ok(())
}

fn load_one(conn: &mut SqliteConnection, flow_id: i32, hub_id: i32) -> RepositoryResult<Option<DomainFlow>> {
    use crate::schema::approval_flows;

    let flow = approval_flows::table
        .filter(approval_flows::id.eq(flow_id))
        .filter(approval_flows::hub_id.eq(hub_id))
        .first::<DbFlow>(conn)
        .optional()?;

    match flow {
        Some(flow) => Ok(hydrate(conn, vec![flow])?.pop()),
        None => Ok(None),
    }
}

impl ApprovalFlowReader for DieselRepository {
    fn get_flow_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<DomainFlow>> {
        let mut conn = self.conn()?;
        load_one(&mut conn, id, hub_id)
    }

    fn list_flows(&self, query: ApprovalFlowListQuery) -> RepositoryResult<Vec<DomainFlow>> {
        use crate::schema::approval_flows;

        let mut conn = self.conn()?;

        let mut items = approval_flows::table
            .filter(approval_flows::hub_id.eq(query.hub_id))
            .into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(document_type) = query.document_type {
            items = items.filter(approval_flows::document_type.eq(document_type.as_str()));
        }

        if let Some(is_active) = query.is_active {
            items = items.filter(approval_flows::is_active.eq(is_active));
        }

        let rows = items
            .order((approval_flows::priority.desc(), approval_flows::id.asc()))
            .load::<DbFlow>(&mut conn)?;

        hydrate(&mut conn, rows)
    }
}

impl ApprovalFlowWriter for DieselRepository {
    fn create_flow(&self, new_flow: &DomainNewFlow) -> RepositoryResult<DomainFlow> {
        use crate::schema::approval_flows;

        let mut conn = self.conn()?;

        conn.transaction::<DomainFlow, RepositoryError, _>(|conn| {
            let db_new = DbNewFlow::from(new_flow);

            let created = diesel::insert_into(approval_flows::table)
                .values(&db_new)
                .get_result::<DbFlow>(conn)?;

            insert_steps(conn, created.id, new_flow)?;

            load_one(conn, created.id, new_flow.hub_id)?.ok_or(RepositoryError::NotFound)
        })
    }

    fn update_flow(
        &self,
        flow_id: i32,
        hub_id: i32,
        flow: &DomainNewFlow,
    ) -> RepositoryResult<DomainFlow> {
        use crate::schema::{approval_flow_steps, approval_flows};

        let mut conn = self.conn()?;

        conn.transaction::<DomainFlow, RepositoryError, _>(|conn| {
            let db_flow = DbNewFlow::from(flow);
            let target = approval_flows::table
                .filter(approval_flows::id.eq(flow_id))
                .filter(approval_flows::hub_id.eq(hub_id));

            let updated = diesel::update(target)
                .set((
                    approval_flows::name.eq(db_flow.name),
                    approval_flows::description.eq(db_flow.description),
                    approval_flows::document_type.eq(db_flow.document_type),
                    approval_flows::conditions.eq(&db_flow.conditions),
                    approval_flows::is_active.eq(db_flow.is_active),
                    approval_flows::is_default.eq(db_flow.is_default),
                    approval_flows::priority.eq(db_flow.priority),
                    approval_flows::updated_at.eq(db_flow.updated_at),
                ))
                .execute(conn)?;

            if updated == 0 {
                return Err(RepositoryError::NotFound);
            }

            diesel::delete(
                approval_flow_steps::table.filter(approval_flow_steps::flow_id.eq(flow_id)),
            )
            .execute(conn)?;
            insert_steps(conn, flow_id, flow)?;

            load_one(conn, flow_id, hub_id)?.ok_or(RepositoryError::NotFound)
        })
    }

    fn delete_flow(&self, flow_id: i32, hub_id: i32) -> RepositoryResult<()> {
        use crate::schema::{approval_flow_steps, approval_flows, approval_instances};

        let mut conn = self.conn()?;

        conn.transaction::<(), RepositoryError, _>(|conn| {
            let target = approval_flows::table
                .filter(approval_flows::id.eq(flow_id))
                .filter(approval_flows::hub_id.eq(hub_id));

            let exists = target
                .clone()
                .select(approval_flows::id)
                .first::<i32>(conn)
                .optional()?;
            if exists.is_none() {
                return Err(RepositoryError::NotFound);
            }

            // Running instances keep their copied steps.
            diesel::update(
                approval_instances::table.filter(approval_instances::flow_id.eq(Some(flow_id))),
            )
            .set(approval_instances::flow_id.eq(None::<i32>))
            .execute(conn)?;

            diesel::delete(
                approval_flow_steps::table.filter(approval_flow_steps::flow_id.eq(flow_id)),
            )
            .execute(conn)?;
            diesel::delete(target).execute(conn)?;

            Ok(())
        })
    }
}
