use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use pushkind_common::repository::errors::{RepositoryError, RepositoryResult};

use crate::{
    domain::ledger::{
        BudgetOperation, ConstructionLedger as DomainLedger, CostBreakdown, LedgerListQuery,
        NewLedger as DomainNewLedger, UpdateLedger as DomainUpdateLedger, actual_cost_from_orders,
    },
    domain::order::{ActualCosts, OrderStatus},
    models::ledger::{
        ConstructionLedger as DbLedger, NewLedger as DbNewLedger, UpdateLedger as DbUpdateLedger,
    },
    repository::{DieselRepository, LedgerReader, LedgerWriter},
};

/// Rebuild a ledger's actual cost from the DW costs of its live orders.
pub(crate) fn reconcile_ledger(
    conn: &mut SqliteConnection,
    ledger_id: i32,
    hub_id: i32,
    at: NaiveDateTime,
) -> RepositoryResult<DbLedger> {
    use crate::schema::{construction_ledgers, orders};

    let rows = orders::table
        .filter(orders::hub_id.eq(hub_id))
        .filter(orders::ledger_id.eq(Some(ledger_id)))
        .filter(orders::status.ne(OrderStatus::Cancelled.as_str()))
        .select((
            orders::actual_labor_cents,
            orders::actual_material_cents,
            orders::actual_equipment_cents,
            orders::actual_other_cents,
        ))
        .load::<(i64, i64, i64, i64)>(conn)?;

    let costs: Vec<ActualCosts> = rows
        .into_iter()
        .map(|(labor, material, equipment, other)| ActualCosts {
            labor_cents: labor,
            material_cents: material,
            equipment_cents: equipment,
            other_cents: other,
        })
        .collect();

    let updates = DomainUpdateLedger::new(at)
        .actual_cost(actual_cost_from_orders(costs.iter()))
        .dw_last_updated_at(at);
    let db_updates = DbUpdateLedger::from(&updates);

    let target = construction_ledgers::table
        .filter(construction_ledgers::id.eq(ledger_id))
        .filter(construction_ledgers::hub_id.eq(hub_id));

    diesel::update(target)
        .set(&db_updates)
        .get_result::<DbLedger>(conn)
        .optional()?
        .ok_or(RepositoryError::NotFound)
}

impl LedgerReader for DieselRepository {
    fn get_ledger_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<DomainLedger>> {
        use crate::schema::construction_ledgers;

        let mut conn = self.conn()?;
        let ledger = construction_ledgers::table
            .filter(construction_ledgers::id.eq(id))
            .filter(construction_ledgers::hub_id.eq(hub_id))
            .first::<DbLedger>(&mut conn)
            .optional()?;

        Ok(ledger.map(Into::into))
    }

    fn get_ledger_by_construction_no(
        &self,
        construction_no: &str,
        hub_id: i32,
    ) -> RepositoryResult<Option<DomainLedger>> {
        use crate::schema::construction_ledgers;

        let mut conn = self.conn()?;
        let ledger = construction_ledgers::table
            .filter(construction_ledgers::construction_no.eq(construction_no))
            .filter(construction_ledgers::hub_id.eq(hub_id))
            .first::<DbLedger>(&mut conn)
            .optional()?;

        Ok(ledger.map(Into::into))
    }

    fn list_ledgers(&self, query: LedgerListQuery) -> RepositoryResult<(usize, Vec<DomainLedger>)> {
        use crate::schema::construction_ledgers;

        let mut conn = self.conn()?;

        let LedgerListQuery {
            hub_id,
            customer_id,
            status,
            search,
            pagination,
        } = query;

        let search_pattern = search.as_ref().map(|term| format!("%{}%", term));

        let mut count_query = construction_ledgers::table
            .filter(construction_ledgers::hub_id.eq(hub_id))
            .into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(customer) = customer_id {
            count_query = count_query.filter(construction_ledgers::customer_id.eq(Some(customer)));
        }

        if let Some(status) = status {
            count_query = count_query.filter(construction_ledgers::status.eq(status.as_str()));
        }

        if let Some(ref pattern) = search_pattern {
            count_query = count_query.filter(
                construction_ledgers::construction_no
                    .like(pattern.clone())
                    .or(construction_ledgers::construction_name.like(pattern.clone())),
            );
        }

        let total = count_query.count().get_result::<i64>(&mut conn)? as usize;

        let mut items = construction_ledgers::table
            .filter(construction_ledgers::hub_id.eq(hub_id))
            .into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(customer) = customer_id {
            items = items.filter(construction_ledgers::customer_id.eq(Some(customer)));
        }

        if let Some(status) = status {
            items = items.filter(construction_ledgers::status.eq(status.as_str()));
        }

        if let Some(ref pattern) = search_pattern {
            items = items.filter(
                construction_ledgers::construction_no
                    .like(pattern.clone())
                    .or(construction_ledgers::construction_name.like(pattern.clone())),
            );
        }

        items = items.order((
            construction_ledgers::created_at.desc(),
            construction_ledgers::id.desc(),
        ));

        if let Some(pagination) = pagination {
            let offset = ((pagination.page.max(1) - 1) * pagination.per_page) as i64;
            let limit = pagination.per_page as i64;
            items = items.offset(offset).limit(limit);
        }

        let ledgers = items.load::<DbLedger>(&mut conn)?;

        Ok((total, ledgers.into_iter().map(Into::into).collect()))
    }
}

impl LedgerWriter for DieselRepository {
    fn create_ledger(&self, new_ledger: &DomainNewLedger) -> RepositoryResult<DomainLedger> {
        use crate::schema::construction_ledgers;

        let mut conn = self.conn()?;
        let db_new = DbNewLedger::from(new_ledger);

        let created = diesel::insert_into(construction_ledgers::table)
            .values(&db_new)
            .get_result::<DbLedger>(&mut conn)?;

        Ok(created.into())
    }

    fn update_ledger(
        &self,
        ledger_id: i32,
        hub_id: i32,
        updates: &DomainUpdateLedger,
    ) -> RepositoryResult<DomainLedger> {
        use crate::schema::construction_ledgers;

        let mut conn = self.conn()?;
        let db_updates = DbUpdateLedger::from(updates);

        let target = construction_ledgers::table
            .filter(construction_ledgers::id.eq(ledger_id))
            .filter(construction_ledgers::hub_id.eq(hub_id));

        let updated = diesel::update(target)
            .set(&db_updates)
            .get_result::<DbLedger>(&mut conn)
            .optional()?;

        match updated {
            Some(ledger) => Ok(ledger.into()),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn apply_order_budget(
        &self,
        ledger_id: i32,
        order_id: i32,
        hub_id: i32,
        change: &CostBreakdown,
        operation: BudgetOperation,
    ) -> RepositoryResult<Option<DomainLedger>> {
        use crate::schema::{construction_ledgers, orders};

        let mut conn = self.conn()?;
        let now = chrono::Utc::now().naive_utc();
        let delta = *change;

        conn.transaction::<Option<DomainLedger>, RepositoryError, _>(|conn| {
            let order = orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::hub_id.eq(hub_id));

            let flipped = match operation {
                BudgetOperation::Add => diesel::update(order.filter(orders::budget_applied.eq(false)))
                    .set((
                        orders::budget_applied.eq(true),
                        orders::ledger_id.eq(Some(ledger_id)),
                        orders::updated_at.eq(now),
                    ))
                    .execute(conn)?,
                BudgetOperation::Subtract => diesel::update(
                    order
                        .filter(orders::budget_applied.eq(true))
                        .filter(orders::ledger_id.eq(Some(ledger_id))),
                )
                .set((orders::budget_applied.eq(false), orders::updated_at.eq(now)))
                .execute(conn)?,
            };

            if flipped == 0 {
                return Ok(None);
            }

            let target = construction_ledgers::table
                .filter(construction_ledgers::id.eq(ledger_id))
                .filter(construction_ledgers::hub_id.eq(hub_id));

            let updated = diesel::update(target)
                .set((
                    construction_ledgers::budget_material_cents
                        .eq(construction_ledgers::budget_material_cents + delta.material_cents),
                    construction_ledgers::budget_labor_cents
                        .eq(construction_ledgers::budget_labor_cents + delta.labor_cents),
                    construction_ledgers::budget_outsourcing_cents.eq(
                        construction_ledgers::budget_outsourcing_cents + delta.outsourcing_cents,
                    ),
                    construction_ledgers::budget_expense_cents
                        .eq(construction_ledgers::budget_expense_cents + delta.expense_cents),
                    construction_ledgers::updated_at.eq(now),
                ))
                .get_result::<DbLedger>(conn)
                .optional()?;

            // Rolls back the flag flip when the ledger is outside the hub.
            match updated {
                Some(ledger) => Ok(Some(ledger.into())),
                None => Err(RepositoryError::NotFound),
            }
        })
    }

    fn reconcile_ledger_costs(
        &self,
        ledger_id: i32,
        hub_id: i32,
        at: NaiveDateTime,
    ) -> RepositoryResult<DomainLedger> {
        let mut conn = self.conn()?;

        conn.transaction::<DomainLedger, RepositoryError, _>(|conn| {
            reconcile_ledger(conn, ledger_id, hub_id, at).map(Into::into)
        })
    }
}
