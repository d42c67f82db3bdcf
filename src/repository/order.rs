use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use pushkind_common::repository::errors::{RepositoryError, RepositoryResult};

use crate::{
    domain::ledger::ConstructionLedger as DomainLedger,
    domain::order::{
        NewOrder as DomainNewOrder, Order as DomainOrder, OrderListQuery, OrderStatus,
        UpdateOrder as DomainUpdateOrder,
    },
    models::order::{
        NewOrder as DbNewOrder, NewOrderCostDetail as DbNewOrderCostDetail,
        NewOrderWorkItem as DbNewOrderWorkItem, Order as DbOrder,
        OrderCostDetail as DbOrderCostDetail, OrderWorkItem as DbOrderWorkItem,
        UpdateOrder as DbUpdateOrder,
    },
    repository::{DieselRepository, OrderReader, OrderWriter, ledger::reconcile_ledger},
};

/// Attach work items and cost details to loaded order rows.
fn hydrate(conn: &mut SqliteConnection, rows: Vec<DbOrder>) -> RepositoryResult<Vec<DomainOrder>> {
    use crate::schema::{order_cost_details, order_work_items};

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<i32> = rows.iter().map(|order| order.id).collect();

    let mut items_by_order: HashMap<i32, Vec<DbOrderWorkItem>> = HashMap::new();
    for item in order_work_items::table
        .filter(order_work_items::order_id.eq_any(&order_ids))
        .order(order_work_items::id.asc())
        .load::<DbOrderWorkItem>(conn)?
    {
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    let mut details_by_order: HashMap<i32, Vec<DbOrderCostDetail>> = HashMap::new();
    for detail in order_cost_details::table
        .filter(order_cost_details::order_id.eq_any(&order_ids))
        .order(order_cost_details::id.asc())
        .load::<DbOrderCostDetail>(conn)?
    {
        details_by_order
            .entry(detail.order_id)
            .or_default()
            .push(detail);
    }

    Ok(rows
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            let details = details_by_order.remove(&order.id).unwrap_or_default();
            DomainOrder::from((order, items, details))
        })
        .collect())
}

fn hydrate_one(conn: &mut SqliteConnection, row: DbOrder) -> RepositoryResult<DomainOrder> {
    hydrate(conn, vec![row])?
        .pop()
        .ok_or(RepositoryError::NotFound)
}

fn update_in(
    conn: &mut SqliteConnection,
    order_id: i32,
    hub_id: i32,
    updates: &DomainUpdateOrder,
) -> RepositoryResult<DbOrder> {
    use crate::schema::{order_cost_details, orders};

    let db_updates = DbUpdateOrder::from(updates);
    let target = orders::table
        .filter(orders::id.eq(order_id))
        .filter(orders::hub_id.eq(hub_id));

    let updated = diesel::update(target)
        .set(&db_updates)
        .get_result::<DbOrder>(conn)
        .optional()?
        .ok_or(RepositoryError::NotFound)?;

    if let Some(details) = updates.cost_details.as_ref() {
        diesel::delete(order_cost_details::table.filter(order_cost_details::order_id.eq(order_id)))
            .execute(conn)?;

        if !details.is_empty() {
            let payload: Vec<DbNewOrderCostDetail> = details
                .iter()
                .map(|detail| DbNewOrderCostDetail::from_domain(order_id, detail))
                .collect();

            diesel::insert_into(order_cost_details::table)
                .values(&payload)
                .execute(conn)?;
        }
    }

    Ok(updated)
}

impl OrderReader for DieselRepository {
    fn get_order_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<DomainOrder>> {
        use crate::schema::orders;

        let mut conn = self.conn()?;
        let order = orders::table
            .filter(orders::id.eq(id))
            .filter(orders::hub_id.eq(hub_id))
            .first::<DbOrder>(&mut conn)
            .optional()?;

        match order {
            Some(order) => Ok(Some(hydrate_one(&mut conn, order)?)),
            None => Ok(None),
        }
    }

    fn get_order_by_no(&self, order_no: &str, hub_id: i32) -> RepositoryResult<Option<DomainOrder>> {
        use crate::schema::orders;

        let mut conn = self.conn()?;
        let order = orders::table
            .filter(orders::order_no.eq(order_no))
            .filter(orders::hub_id.eq(hub_id))
            .first::<DbOrder>(&mut conn)
            .optional()?;

        match order {
            Some(order) => Ok(Some(hydrate_one(&mut conn, order)?)),
            None => Ok(None),
        }
    }

    fn get_order_by_dw_id(
        &self,
        dw_order_id: &str,
        hub_id: i32,
    ) -> RepositoryResult<Option<DomainOrder>> {
        use crate::schema::orders;

        let mut conn = self.conn()?;
        let order = orders::table
            .filter(orders::dw_order_id.eq(dw_order_id))
            .filter(orders::hub_id.eq(hub_id))
            .first::<DbOrder>(&mut conn)
            .optional()?;

        match order {
            Some(order) => Ok(Some(hydrate_one(&mut conn, order)?)),
            None => Ok(None),
        }
    }

    fn list_orders(&self, query: OrderListQuery) -> RepositoryResult<(usize, Vec<DomainOrder>)> {
        use crate::schema::orders;

        let mut conn = self.conn()?;

        let OrderListQuery {
            hub_id,
            status,
            ledger_id,
            search,
            pagination,
        } = query;

        let search_pattern = search.as_ref().map(|term| format!("%{}%", term));

        let mut count_query = orders::table
            .filter(orders::hub_id.eq(hub_id))
            .into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(status) = status {
            count_query = count_query.filter(orders::status.eq(status.as_str()));
        }

        if let Some(ledger) = ledger_id {
            count_query = count_query.filter(orders::ledger_id.eq(Some(ledger)));
        }

        if let Some(ref pattern) = search_pattern {
            count_query = count_query.filter(
                orders::order_no
                    .like(pattern.clone())
                    .or(orders::project_name.like(pattern.clone()))
                    .or(orders::partner_name.like(pattern.clone())),
            );
        }

        let total = count_query.count().get_result::<i64>(&mut conn)? as usize;

        let mut items = orders::table
            .filter(orders::hub_id.eq(hub_id))
            .into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(status) = status {
            items = items.filter(orders::status.eq(status.as_str()));
        }

        if let Some(ledger) = ledger_id {
            items = items.filter(orders::ledger_id.eq(Some(ledger)));
        }

        if let Some(ref pattern) = search_pattern {
            items = items.filter(
                orders::order_no
                    .like(pattern.clone())
                    .or(orders::project_name.like(pattern.clone()))
                    .or(orders::partner_name.like(pattern.clone())),
            );
        }

        items = items.order((orders::created_at.desc(), orders::id.desc()));

        if let Some(pagination) = pagination {
            let offset = ((pagination.page.max(1) - 1) * pagination.per_page) as i64;
            let limit = pagination.per_page as i64;
            items = items.offset(offset).limit(limit);
        }

        let db_orders = items.load::<DbOrder>(&mut conn)?;

        Ok((total, hydrate(&mut conn, db_orders)?))
    }
}

impl OrderWriter for DieselRepository {
    fn create_order(&self, new_order: &DomainNewOrder) -> RepositoryResult<DomainOrder> {
        use crate::schema::{order_work_items, orders};

        let mut conn = self.conn()?;

        conn.transaction::<DomainOrder, RepositoryError, _>(|conn| {
            let db_new = DbNewOrder::from(new_order);

            let created = diesel::insert_into(orders::table)
                .values(&db_new)
                .get_result::<DbOrder>(conn)?;

            if !new_order.work_items.is_empty() {
                let payload: Vec<DbNewOrderWorkItem> = new_order
                    .work_items
                    .iter()
                    .map(|item| DbNewOrderWorkItem::from_domain(created.id, item))
                    .collect();

                diesel::insert_into(order_work_items::table)
                    .values(&payload)
                    .execute(conn)?;
            }

            hydrate_one(conn, created)
        })
    }

    fn update_order(
        &self,
        order_id: i32,
        hub_id: i32,
        updates: &DomainUpdateOrder,
    ) -> RepositoryResult<DomainOrder> {
        let mut conn = self.conn()?;

        conn.transaction::<DomainOrder, RepositoryError, _>(|conn| {
            let updated = update_in(conn, order_id, hub_id, updates)?;

            // Cancelled orders no longer count towards the ledger's actual cost.
            if updates.status == Some(OrderStatus::Cancelled) {
                if let Some(ledger_id) = updated.ledger_id {
                    reconcile_ledger(conn, ledger_id, hub_id, updates.updated_at)?;
                }
            }

            hydrate_one(conn, updated)
        })
    }

    fn delete_order(&self, order_id: i32, hub_id: i32) -> RepositoryResult<()> {
        use crate::schema::{order_cost_details, order_work_items, orders};

        let mut conn = self.conn()?;

        conn.transaction::<(), RepositoryError, _>(|conn| {
            let exists = orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::hub_id.eq(hub_id))
                .select(orders::id)
                .first::<i32>(conn)
                .optional()?;

            if exists.is_none() {
                return Err(RepositoryError::NotFound);
            }

            diesel::delete(order_work_items::table.filter(order_work_items::order_id.eq(order_id)))
                .execute(conn)?;
            diesel::delete(
                order_cost_details::table.filter(order_cost_details::order_id.eq(order_id)),
            )
            .execute(conn)?;
            diesel::delete(orders::table.filter(orders::id.eq(order_id))).execute(conn)?;

            Ok(())
        })
    }

    fn record_dw_costs(
        &self,
        order_id: i32,
        hub_id: i32,
        updates: &DomainUpdateOrder,
    ) -> RepositoryResult<(DomainOrder, Option<DomainLedger>)> {
        let mut conn = self.conn()?;

        conn.transaction::<(DomainOrder, Option<DomainLedger>), RepositoryError, _>(|conn| {
            let updated = update_in(conn, order_id, hub_id, updates)?;

            let ledger = match updated.ledger_id {
                Some(ledger_id) => {
                    Some(reconcile_ledger(conn, ledger_id, hub_id, updates.updated_at)?.into())
                }
                None => None,
            };

            Ok((hydrate_one(conn, updated)?, ledger))
        })
    }
}
