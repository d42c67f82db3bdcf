use std::collections::HashMap;

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use pushkind_common::repository::errors::{RepositoryError, RepositoryResult};

use crate::{
    domain::approval::{
        ApprovalInstance as DomainInstance, ApprovalListQuery,
        NewApprovalInstance as DomainNewInstance, RecordedAction,
    },
    models::approval::{
        ApprovalAction as DbAction, ApprovalInstance as DbInstance,
        ApprovalInstanceStep as DbStep, ApprovalProgress, NewApprovalAction as DbNewAction,
        NewApprovalInstance as DbNewInstance, NewApprovalInstanceStep as DbNewStep,
        StepProgress,
    },
    repository::{ApprovalReader, ApprovalWriter, DieselRepository},
};

fn hydrate(
    conn: &mut SqliteConnection,
    rows: Vec<DbInstance>,
) -> RepositoryResult<Vec<DomainInstance>> {
    use crate::schema::{approval_actions, approval_instance_steps};

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = rows.iter().map(|instance| instance.id).collect();

    let mut steps_by_instance: HashMap<i32, Vec<DbStep>> = HashMap::new();
    for step in approval_instance_steps::table
        .filter(approval_instance_steps::instance_id.eq_any(&ids))
        .order(approval_instance_steps::step_number.asc())
        .load::<DbStep>(conn)?
    {
        steps_by_instance
            .entry(step.instance_id)
            .or_default()
            .push(step);
    }

    let mut actions_by_instance: HashMap<i32, Vec<DbAction>> = HashMap::new();
    for action in approval_actions::table
        .filter(approval_actions::instance_id.eq_any(&ids))
        .order(approval_actions::id.asc())
        .load::<DbAction>(conn)?
    {
        actions_by_instance
            .entry(action.instance_id)
            .or_default()
            .push(action);
    }

    Ok(rows
        .into_iter()
        .filter_map(|instance| {
            let steps = steps_by_instance.remove(&instance.id).unwrap_or_default();
            let actions = actions_by_instance.remove(&instance.id).unwrap_or_default();
            instance.into_domain(steps, actions)
        })
        .collect())
}

fn load_one(
    conn: &mut SqliteConnection,
    id: i32,
    hub_id: i32,
) -> RepositoryResult<Option<DomainInstance>> {
    use crate::schema::approval_instances;

    let instance = approval_instances::table
        .filter(approval_instances::id.eq(id))
        .filter(approval_instances::hub_id.eq(hub_id))
        .first::<DbInstance>(conn)
        .optional()?;

    match instance {
        Some(instance) => Ok(hydrate(conn, vec![instance])?.pop()),
        None => Ok(None),
    }
}

impl ApprovalReader for DieselRepository {
    fn get_approval_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<DomainInstance>> {
        let mut conn = self.conn()?;
        load_one(&mut conn, id, hub_id)
    }

    fn list_approvals(
        &self,
        query: ApprovalListQuery,
    ) -> RepositoryResult<(usize, Vec<DomainInstance>)> {
        use crate::schema::approval_instances;

        let mut conn = self.conn()?;

        let ApprovalListQuery {
            hub_id,
            status,
            document_type,
            document_id,
            requested_by,
            created_from,
            created_to,
            pagination,
        } = query;

        let filtered = || {
            let mut items = approval_instances::table
                .filter(approval_instances::hub_id.eq(hub_id))
                .into_boxed::<diesel::sqlite::Sqlite>();

            if let Some(status) = status {
                items = items.filter(approval_instances::status.eq(status.as_str()));
            }
            if let Some(document_type) = document_type {
                items = items.filter(approval_instances::document_type.eq(document_type.as_str()));
            }
            if let Some(document_id) = document_id.clone() {
                items = items.filter(approval_instances::document_id.eq(document_id));
            }
            if let Some(requested_by) = requested_by.clone() {
                items = items.filter(approval_instances::requested_by_id.eq(requested_by));
            }
            if let Some(from) = created_from {
                items = items.filter(approval_instances::created_at.ge(from));
            }
            if let Some(to) = created_to {
                items = items.filter(approval_instances::created_at.le(to));
            }

            items
        };

        let total = filtered().count().get_result::<i64>(&mut conn)? as usize;

        let mut items = filtered().order((
            approval_instances::created_at.desc(),
            approval_instances::id.desc(),
        ));

        if let Some(pagination) = pagination {
            let offset = ((pagination.page.max(1) - 1) * pagination.per_page) as i64;
            let limit = pagination.per_page as i64;
            items = items.offset(offset).limit(limit);
        }

        let rows = items.load::<DbInstance>(&mut conn)?;

        Ok((total, hydrate(&mut conn, rows)?))
    }
}

impl ApprovalWriter for DieselRepository {
    fn create_approval(
        &self,
        new_instance: &DomainNewInstance,
    ) -> RepositoryResult<Option<DomainInstance>> {
        use crate::schema::{approval_instance_steps, approval_instances};

        let mut conn = self.conn()?;

        conn.transaction::<Option<DomainInstance>, RepositoryError, _>(|conn| {
            let db_new = DbNewInstance::from(new_instance);

            // The partial unique index admits one pending instance per document.
            let created = match diesel::insert_into(approval_instances::table)
                .values(&db_new)
                .get_result::<DbInstance>(conn)
            {
                Ok(created) => created,
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            };

            let steps: Vec<DbNewStep> = new_instance
                .steps
                .iter()
                .map(|step| DbNewStep::from_domain(created.id, step))
                .collect();

            diesel::insert_into(approval_instance_steps::table)
                .values(&steps)
                .execute(conn)?;

            load_one(conn, created.id, new_instance.hub_id)?
                .map(Some)
                .ok_or(RepositoryError::NotFound)
        })
    }

    fn save_approval(
        &self,
        instance: &DomainInstance,
        action: Option<RecordedAction>,
    ) -> RepositoryResult<Option<DomainInstance>> {
        use crate::schema::{approval_actions, approval_instance_steps, approval_instances};

        let mut conn = self.conn()?;

        conn.transaction::<Option<DomainInstance>, RepositoryError, _>(|conn| {
            let target = approval_instances::table
                .filter(approval_instances::id.eq(instance.id))
                .filter(approval_instances::hub_id.eq(instance.hub_id))
                .filter(approval_instances::version.eq(instance.version));

            let updated = diesel::update(target)
                .set(&ApprovalProgress::next_version(instance))
                .execute(conn)?;

            if updated == 0 {
                return Ok(None);
            }

            for step in &instance.steps {
                diesel::update(
                    approval_instance_steps::table
                        .filter(approval_instance_steps::instance_id.eq(instance.id))
                        .filter(approval_instance_steps::step_number.eq(step.step_number)),
                )
                .set(&StepProgress::from(step))
                .execute(conn)?;
            }

            if let Some(recorded) = action.as_ref() {
                let db_action =
                    DbNewAction::from_domain(instance.id, recorded.step_number, &recorded.action);
                diesel::insert_into(approval_actions::table)
                    .values(&db_action)
                    .execute(conn)?;
            }

            load_one(conn, instance.id, instance.hub_id)
        })
    }
}
