//! Order synchronisation with DandoriWork.
//!
//! The HTTP calls live in [`crate::dw::DwClient`]; these services prepare the
//! data sent to DW and store what comes back.

use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::routes::check_role;
use serde::Serialize;

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::ledger::{ProgressStatus, WorkProgress};
use crate::domain::order::{DwCostReport, DwOrderPayload, Order, OrderStatus, UpdateOrder};
use crate::forms::orders::DwCostRow;
use crate::repository::{OrderReader, OrderWriter};
use crate::services::ledgers::LedgerDetail;
use crate::services::orders::{OrderDetail, load_order};
use crate::services::{ServiceError, ServiceResult};

/// Order and ledger state after DW costs were stored.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DwCostsReceived {
    pub order: OrderDetail,
    pub ledger: Option<LedgerDetail>,
}

/// Outcome of a CSV cost import.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct DwImportSummary {
    pub updated: Vec<String>,
    /// Order numbers of rows that matched no order of the hub.
    pub missing: Vec<String>,
}

/// Status an order moves to when DW reports `progress`.
fn progressed_status(current: OrderStatus, progress: Option<WorkProgress>) -> Option<OrderStatus> {
    match (current, progress?.status) {
        (OrderStatus::SentToDw, ProgressStatus::InProgress) => Some(OrderStatus::InProgress),
        (OrderStatus::SentToDw | OrderStatus::InProgress, ProgressStatus::Completed) => {
            Some(OrderStatus::Completed)
        }
        _ => None,
    }
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Payload for pushing an approved order to DW.
pub fn prepare_dw_push<R>(
    repo: &R,
    user: &AuthenticatedUser,
    order_id: i32,
) -> ServiceResult<DwOrderPayload>
where
    R: OrderReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let order = load_order(repo, user.hub_id, order_id)?;
    if order.status != OrderStatus::Approved {
        return Err(ServiceError::Form(format!(
            "only approved orders can be sent to DW, order is {}",
            order.status.as_str()
        )));
    }

    Ok(order.dw_payload())
}

/// Stores the outcome of a push. A failed push is recorded on the order and
/// reported as a form error.
pub fn record_dw_push<R>(
    repo: &R,
    user: &AuthenticatedUser,
    order_id: i32,
    outcome: Result<String, String>,
) -> ServiceResult<Order>
where
    R: OrderWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    match outcome {
        Ok(dw_order_id) => {
            let updates = UpdateOrder::new()
                .status(OrderStatus::SentToDw)
                .dw_synced(dw_order_id, now());
            let order = repo
                .update_order(order_id, user.hub_id, &updates)
                .map_err(ServiceError::from)?;
            log::info!("Order {} sent to DW", order.order_no);
            Ok(order)
        }
        Err(message) => {
            log::warn!("Pushing order {order_id} to DW failed: {message}");
            repo.update_order(order_id, user.hub_id, &UpdateOrder::new().dw_failed(message.as_str()))
                .map_err(ServiceError::from)?;
            Err(ServiceError::Form(format!("DW sync failed: {message}")))
        }
    }
}

/// DW id of an order whose costs should be pulled.
pub fn prepare_dw_pull<R>(repo: &R, user: &AuthenticatedUser, order_id: i32) -> ServiceResult<String>
where
    R: OrderReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    load_order(repo, user.hub_id, order_id)?
        .dw_order_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::Form("order has not been sent to DW".to_string()))
}

fn resolve_report_order<R>(repo: &R, hub_id: i32, report: &DwCostReport) -> ServiceResult<Order>
where
    R: OrderReader + ?Sized,
{
    let dw_order_id = report.dw_order_id.trim();

    if let Some(order_id) = report.order_id {
        let order = load_order(repo, hub_id, order_id)?;
        let linked = order.dw_order_id.as_deref().unwrap_or_default();
        if !dw_order_id.is_empty() && !linked.is_empty() && linked != dw_order_id {
            return Err(ServiceError::Form(format!(
                "DW order {dw_order_id} does not belong to order {}",
                order.order_no
            )));
        }
        return Ok(order);
    }

    if dw_order_id.is_empty() {
        return Err(ServiceError::Form(
            "cost report names neither an order nor a DW order".to_string(),
        ));
    }

    repo.get_order_by_dw_id(dw_order_id, hub_id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)
}

/// Stores a DW cost report on its order and reconciles the linked ledger in
/// the same transaction. Reports replace earlier ones.
pub fn receive_dw_costs<R>(
    repo: &R,
    user: &AuthenticatedUser,
    report: DwCostReport,
) -> ServiceResult<DwCostsReceived>
where
    R: OrderReader + OrderWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let order = resolve_report_order(repo, user.hub_id, &report)?;
    if order.status == OrderStatus::Cancelled {
        return Err(ServiceError::Form("order is cancelled".to_string()));
    }

    let mut updates = UpdateOrder::new().dw_costs(
        report.actual_costs,
        report.work_progress,
        report.cost_details,
        now(),
    );
    if let Some(next) = progressed_status(order.status, report.work_progress) {
        updates = updates.status(next);
    }

    let (order, ledger) = repo
        .record_dw_costs(order.id, user.hub_id, &updates)
        .map_err(ServiceError::from)?;

    Ok(DwCostsReceived {
        order: order.into(),
        ledger: ledger.map(LedgerDetail::from),
    })
}

/// Applies rows of a DW cost export to the hub's orders by order number.
/// Cost details already stored on an order are kept.
pub fn import_dw_costs<R>(
    repo: &R,
    user: &AuthenticatedUser,
    rows: Vec<DwCostRow>,
) -> ServiceResult<DwImportSummary>
where
    R: OrderReader + OrderWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let mut summary = DwImportSummary::default();
    for row in rows {
        let Some(order) = repo
            .get_order_by_no(&row.order_no, user.hub_id)
            .map_err(ServiceError::from)?
            .filter(|order| order.status != OrderStatus::Cancelled)
        else {
            summary.missing.push(row.order_no);
            continue;
        };

        let mut updates =
            UpdateOrder::new().dw_costs(row.actual_costs, row.progress, order.cost_details.clone(), now());
        if let Some(next) = progressed_status(order.status, row.progress) {
            updates = updates.status(next);
        }

        repo.record_dw_costs(order.id, user.hub_id, &updates)
            .map_err(ServiceError::from)?;
        summary.updated.push(row.order_no);
    }

    log::info!(
        "Imported DW costs for {} orders, {} unmatched",
        summary.updated.len(),
        summary.missing.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::ConstructionLedger;
    use crate::domain::order::{ActualCosts, CostDetail, DwSyncStatus, NewOrder, OrderListQuery};
    use crate::repository::mock::{MockOrderReader, MockOrderWriter};
    use crate::services::test_support::{admin_user, ledger, order, user_with_roles};
    use pushkind_common::repository::errors::RepositoryResult;

    #[derive(Default)]
    struct FakeRepo {
        orders: MockOrderReader,
        writer: MockOrderWriter,
    }

    impl OrderReader for FakeRepo {
        fn get_order_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<Order>> {
            self.orders.get_order_by_id(id, hub_id)
        }

        fn get_order_by_no(&self, order_no: &str, hub_id: i32) -> RepositoryResult<Option<Order>> {
            self.orders.get_order_by_no(order_no, hub_id)
        }

        fn get_order_by_dw_id(&self, dw_order_id: &str, hub_id: i32) -> RepositoryResult<Option<Order>> {
            self.orders.get_order_by_dw_id(dw_order_id, hub_id)
        }

        fn list_orders(&self, query: OrderListQuery) -> RepositoryResult<(usize, Vec<Order>)> {
            self.orders.list_orders(query)
        }
    }

    impl OrderWriter for FakeRepo {
        fn create_order(&self, new_order: &NewOrder) -> RepositoryResult<Order> {
            self.writer.create_order(new_order)
        }

        fn update_order(
            &self,
            order_id: i32,
            hub_id: i32,
            updates: &UpdateOrder,
        ) -> RepositoryResult<Order> {
            self.writer.update_order(order_id, hub_id, updates)
        }

        fn delete_order(&self, order_id: i32, hub_id: i32) -> RepositoryResult<()> {
            self.writer.delete_order(order_id, hub_id)
        }

        fn record_dw_costs(
            &self,
            order_id: i32,
            hub_id: i32,
            updates: &UpdateOrder,
        ) -> RepositoryResult<(Order, Option<ConstructionLedger>)> {
            self.writer.record_dw_costs(order_id, hub_id, updates)
        }
    }

    fn sent_order(id: i32) -> Order {
        Order {
            dw_order_id: Some(format!("DW-{id}")),
            dw_sync_status: DwSyncStatus::Synced,
            ..order(id, OrderStatus::SentToDw)
        }
    }

    /// Applies a cost update the way the repository would.
    fn apply(mut order: Order, updates: &UpdateOrder) -> Order {
        if let Some(status) = updates.status {
            order.status = status;
        }
        if let Some(costs) = updates.actual_costs {
            order.actual_costs = costs;
        }
        if let Some(progress) = updates.progress {
            order.progress = progress;
        }
        if let Some(details) = &updates.cost_details {
            order.cost_details = details.clone();
        }
        order
    }

    fn report(order_id: Option<i32>, dw_order_id: &str, progress: Option<WorkProgress>) -> DwCostReport {
        DwCostReport {
            dw_order_id: dw_order_id.to_string(),
            order_id,
            actual_costs: ActualCosts {
                labor_cents: 60_000,
                material_cents: 50_000,
                equipment_cents: 10_000,
                other_cents: 0,
            },
            work_progress: progress,
            cost_details: vec![CostDetail {
                category: "labor".to_string(),
                item_name: "Wiring".to_string(),
                budget_cents: 100_000,
                actual_cents: 60_000,
            }],
        }
    }

    #[test]
    fn push_requires_approved_order() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Pending))));

        assert!(matches!(
            prepare_dw_push(&repo, &admin_user("u1"), 1),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn push_payload_carries_order_totals() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Approved))));

        let payload = prepare_dw_push(&repo, &admin_user("u1"), 4).expect("expected success");

        assert_eq!(payload.order_id, 4);
        assert_eq!(payload.order_no, "PO-4");
        assert_eq!(payload.total_cents, 110_000);
        assert_eq!(payload.work_items.len(), 1);
    }

    #[test]
    fn successful_push_marks_order_sent() {
        let mut repo = FakeRepo::default();
        repo.writer
            .expect_update_order()
            .times(1)
            .withf(|_, _, updates| {
                updates.status == Some(OrderStatus::SentToDw)
                    && updates.dw_sync_status == Some(DwSyncStatus::Synced)
                    && updates.dw_order_id == Some(Some("DW-77".to_string()))
            })
            .returning(|id, _, _| Ok(sent_order(id)));

        let order = record_dw_push(&repo, &admin_user("u1"), 3, Ok("DW-77".to_string()))
            .expect("expected success");

        assert_eq!(order.status, OrderStatus::SentToDw);
    }

    #[test]
    fn failed_push_is_recorded_and_reported() {
        let mut repo = FakeRepo::default();
        repo.writer
            .expect_update_order()
            .times(1)
            .withf(|_, _, updates| {
                updates.status.is_none()
                    && updates.dw_sync_status == Some(DwSyncStatus::Error)
                    && updates.dw_sync_error == Some(Some("timeout".to_string()))
            })
            .returning(|id, _, _| Ok(order(id, OrderStatus::Approved)));

        let result = record_dw_push(&repo, &admin_user("u1"), 3, Err("timeout".to_string()));

        assert!(matches!(result, Err(ServiceError::Form(message)) if message.contains("timeout")));
    }

    #[test]
    fn pull_needs_dw_order_id() {
        let mut repo = FakeRepo::default();
        repo.orders.expect_get_order_by_id().returning(|id, _| {
            Ok(Some(if id == 1 {
                order(id, OrderStatus::Approved)
            } else {
                sent_order(id)
            }))
        });

        assert!(matches!(
            prepare_dw_pull(&repo, &admin_user("u1"), 1),
            Err(ServiceError::Form(_))
        ));
        assert_eq!(
            prepare_dw_pull(&repo, &admin_user("u1"), 2).expect("expected success"),
            "DW-2"
        );
    }

    #[test]
    fn receive_resolves_order_by_dw_id_and_advances_status() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_dw_id()
            .times(1)
            .withf(|dw_id, hub_id| dw_id == "DW-5" && *hub_id == 42)
            .returning(|_, _| Ok(Some(sent_order(5))));
        repo.writer
            .expect_record_dw_costs()
            .times(1)
            .withf(|id, _, updates| {
                *id == 5
                    && updates.status == Some(OrderStatus::InProgress)
                    && updates.actual_costs.map(|costs| costs.total()) == Some(120_000)
            })
            .returning(|id, _, updates| {
                let mut ledger = ledger(1);
                ledger.actual_cost.labor_cents = 60_000;
                ledger.actual_cost.material_cents = 50_000;
                ledger.actual_cost.outsourcing_cents = 10_000;
                Ok((apply(sent_order(id), updates), Some(ledger)))
            });

        let received = receive_dw_costs(
            &repo,
            &admin_user("u1"),
            report(None, "DW-5", Some(WorkProgress::new(ProgressStatus::InProgress, 40))),
        )
        .expect("expected success");

        assert_eq!(received.order.order.status, OrderStatus::InProgress);
        assert_eq!(received.order.cost_analysis.actual_cents, 120_000);
        assert_eq!(received.order.cost_analysis.variance_cents, -10_000);
        assert!(received.order.cost_analysis.is_over_budget);
        let ledger = received.ledger.expect("linked ledger");
        assert_eq!(ledger.actual_total_cents, 120_000);
    }

    #[test]
    fn receive_rejects_mismatched_ids() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(sent_order(id))));
        repo.writer.expect_record_dw_costs().never();

        assert!(matches!(
            receive_dw_costs(&repo, &admin_user("u1"), report(Some(5), "DW-9", None)),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn receive_without_any_id_is_a_form_error() {
        let repo = FakeRepo::default();

        assert!(matches!(
            receive_dw_costs(&repo, &admin_user("u1"), report(None, "  ", None)),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn import_reports_unmatched_rows_and_keeps_details() {
        let mut repo = FakeRepo::default();
        repo.orders.expect_get_order_by_no().returning(|order_no, _| {
            Ok((order_no == "PO-5").then(|| {
                let mut order = sent_order(5);
                order.cost_details = vec![CostDetail {
                    category: "labor".to_string(),
                    item_name: "Wiring".to_string(),
                    budget_cents: 100_000,
                    actual_cents: 0,
                }];
                order
            }))
        });
        repo.writer
            .expect_record_dw_costs()
            .times(1)
            .withf(|id, _, updates| {
                *id == 5
                    && updates.status == Some(OrderStatus::Completed)
                    && updates.cost_details.as_ref().map(Vec::len) == Some(1)
            })
            .returning(|id, _, updates| Ok((apply(sent_order(id), updates), None)));

        let rows = vec![
            DwCostRow {
                order_no: "PO-5".to_string(),
                actual_costs: ActualCosts {
                    labor_cents: 1_000,
                    ..ActualCosts::default()
                },
                progress: Some(WorkProgress::new(ProgressStatus::Completed, 100)),
            },
            DwCostRow {
                order_no: "PO-404".to_string(),
                actual_costs: ActualCosts::default(),
                progress: None,
            },
        ];

        let summary = import_dw_costs(&repo, &admin_user("u1"), rows).expect("expected success");

        assert_eq!(summary.updated, vec!["PO-5".to_string()]);
        assert_eq!(summary.missing, vec!["PO-404".to_string()]);
    }

    #[test]
    fn import_requires_role() {
        let repo = FakeRepo::default();

        assert!(matches!(
            import_dw_costs(&repo, &user_with_roles(&["viewer"]), Vec::new()),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn progress_only_moves_orders_forward() {
        let completed = Some(WorkProgress::new(ProgressStatus::Completed, 100));
        let started = Some(WorkProgress::new(ProgressStatus::InProgress, 10));

        assert_eq!(progressed_status(OrderStatus::SentToDw, started), Some(OrderStatus::InProgress));
        assert_eq!(progressed_status(OrderStatus::InProgress, completed), Some(OrderStatus::Completed));
        assert_eq!(progressed_status(OrderStatus::InProgress, started), None);
        assert_eq!(progressed_status(OrderStatus::Approved, completed), None);
        assert_eq!(progressed_status(OrderStatus::SentToDw, None), None);
    }
}
