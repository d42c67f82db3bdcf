use std::collections::HashMap;

use chrono::NaiveDate;
use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use pushkind_common::routes::check_role;
use serde::{Deserialize, Serialize};

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::approval::{ApprovalInstance, ApprovalListQuery, ApprovalRequest, ApprovalStatus};
use crate::domain::approval_flow::DocumentType;
use crate::domain::order::{
    DeadlineAlert, DeadlineAlertStats, Order, OrderCostAnalysis, OrderListQuery, OrderStatus,
    UpdateOrder, deadline_alerts,
};
use crate::forms::orders::{AddOrderForm, DeadlineAlertsQuery, UpdateOrderStatusPayload};
use crate::repository::{
    ApprovalFlowReader, ApprovalReader, ApprovalWriter, LedgerReader, OrderReader, OrderWriter,
};
use crate::services::approvals::{now, open_approval, requester};
use crate::services::{ServiceError, ServiceResult};

/// Query parameters accepted by `GET /orders`.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    /// Matched against order number, project and partner name.
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub ledger_id: Option<i32>,
    pub page: Option<usize>,
}

/// Order together with its budget-versus-actual analysis.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub cost_analysis: OrderCostAnalysis,
}

impl From<Order> for OrderDetail {
    fn from(order: Order) -> Self {
        Self {
            cost_analysis: order.cost_analysis(),
            order,
        }
    }
}

/// An order that was submitted together with the approval opened for it.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub order: Order,
    pub approval: ApprovalInstance,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DeadlineAlerts {
    pub alerts: Vec<DeadlineAlert>,
    pub stats: DeadlineAlertStats,
}

pub fn list_orders<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: OrdersQuery,
) -> ServiceResult<Paginated<OrderDetail>>
where
    R: OrderReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let page = query.page.unwrap_or(1);
    let mut list_query = OrderListQuery::new(user.hub_id).paginate(page, DEFAULT_ITEMS_PER_PAGE);
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        list_query = list_query.search(search);
    }
    if let Some(status) = query.status {
        list_query = list_query.status(status);
    }
    if let Some(ledger_id) = query.ledger_id {
        list_query = list_query.ledger_id(ledger_id);
    }

    let (total, orders) = repo.list_orders(list_query).map_err(ServiceError::from)?;
    let items = orders.into_iter().map(OrderDetail::from).collect();

    Ok(Paginated::new(items, page, total.div_ceil(DEFAULT_ITEMS_PER_PAGE)))
}

pub fn get_order<R>(repo: &R, user: &AuthenticatedUser, order_id: i32) -> ServiceResult<OrderDetail>
where
    R: OrderReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    load_order(repo, user.hub_id, order_id).map(OrderDetail::from)
}

pub(crate) fn load_order<R>(repo: &R, hub_id: i32, order_id: i32) -> ServiceResult<Order>
where
    R: OrderReader + ?Sized,
{
    repo.get_order_by_id(order_id, hub_id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)
}

/// Creates a draft order. Its deadline falls `deadline_days` after the
/// contract date and a linked ledger must belong to the same hub.
pub fn create_order<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: AddOrderForm,
    deadline_days: i64,
) -> ServiceResult<OrderDetail>
where
    R: OrderReader + OrderWriter + LedgerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let new_order = form
        .into_new_order(user.hub_id, deadline_days)
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    if let Some(ledger_id) = new_order.ledger_id {
        let ledger = repo
            .get_ledger_by_id(ledger_id, user.hub_id)
            .map_err(ServiceError::from)?;
        if ledger.is_none() {
            return Err(ServiceError::Form(format!("ledger {ledger_id} does not exist")));
        }
    }

    let existing = repo
        .get_order_by_no(&new_order.order_no, user.hub_id)
        .map_err(ServiceError::from)?;
    if existing.is_some() {
        return Err(ServiceError::Conflict);
    }

    repo.create_order(&new_order)
        .map(OrderDetail::from)
        .map_err(ServiceError::from)
}

/// Cancel the pending purchase approvals opened for `order_id`.
fn withdraw_purchase_approvals<R>(repo: &R, hub_id: i32, order_id: i32) -> ServiceResult<()>
where
    R: ApprovalReader + ApprovalWriter + ?Sized,
{
    let (_, pending) = repo
        .list_approvals(
            ApprovalListQuery::new(hub_id)
                .document_type(DocumentType::Purchase)
                .document_id(order_id.to_string())
                .status(ApprovalStatus::Pending),
        )
        .map_err(ServiceError::from)?;

    for mut instance in pending {
        instance
            .cancel(now())
            .map_err(|err| ServiceError::Form(err.to_string()))?;
        repo.save_approval(&instance, None)
            .map_err(ServiceError::from)?
            .ok_or(ServiceError::Conflict)?;
        log::info!("Withdrew approval {} of order {order_id}", instance.id);
    }

    Ok(())
}

/// Applies a manual status change permitted by the order lifecycle.
///
/// Taking a pending order back to draft or cancelling it withdraws its
/// open purchase approval first.
pub fn update_order_status<R>(
    repo: &R,
    user: &AuthenticatedUser,
    order_id: i32,
    payload: UpdateOrderStatusPayload,
) -> ServiceResult<OrderDetail>
where
    R: OrderReader + OrderWriter + ApprovalReader + ApprovalWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let order = load_order(repo, user.hub_id, order_id)?;
    if !order.status.can_transition_to(payload.status) {
        return Err(ServiceError::Form(format!(
            "cannot change order status from {} to {}",
            order.status.as_str(),
            payload.status.as_str()
        )));
    }

    if order.status == OrderStatus::Pending {
        withdraw_purchase_approvals(repo, user.hub_id, order.id)?;
    }

    repo.update_order(order.id, user.hub_id, &UpdateOrder::new().status(payload.status))
        .map(OrderDetail::from)
        .map_err(ServiceError::from)
}

/// Deletes a draft or cancelled order that is not part of a ledger budget.
pub fn delete_order<R>(repo: &R, user: &AuthenticatedUser, order_id: i32) -> ServiceResult<()>
where
    R: OrderReader + OrderWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let order = load_order(repo, user.hub_id, order_id)?;
    if !order.status.is_deletable() {
        return Err(ServiceError::Form(format!(
            "orders in status {} cannot be deleted",
            order.status.as_str()
        )));
    }
    if order.budget_applied {
        return Err(ServiceError::Form(format!(
            "order {} is still counted in its ledger budget; subtract it first",
            order.order_no
        )));
    }

    repo.delete_order(order.id, user.hub_id)
        .map_err(ServiceError::from)
}

/// Submits a draft order for approval through the matching `purchase` flow.
pub fn submit_order_for_approval<R>(
    repo: &R,
    user: &AuthenticatedUser,
    order_id: i32,
) -> ServiceResult<SubmittedOrder>
where
    R: OrderReader + OrderWriter + ApprovalFlowReader + ApprovalReader + ApprovalWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let order = load_order(repo, user.hub_id, order_id)?;
    if order.status != OrderStatus::Draft {
        return Err(ServiceError::Form(format!(
            "only draft orders can be submitted, order is {}",
            order.status.as_str()
        )));
    }

    let document_id = order.id.to_string();
    let (open, _) = repo
        .list_approvals(
            ApprovalListQuery::new(user.hub_id)
                .document_type(DocumentType::Purchase)
                .document_id(document_id.clone())
                .status(ApprovalStatus::Pending),
        )
        .map_err(ServiceError::from)?;
    if open > 0 {
        return Err(ServiceError::Conflict);
    }

    let approval = open_approval(
        repo,
        user.hub_id,
        ApprovalRequest {
            document_type: DocumentType::Purchase,
            document_id,
            document_title: format!("{} {}", order.order_no, order.project_name),
            amount_cents: Some(order.total_cents),
            requested_by: requester(user),
            attributes: HashMap::from([
                ("partnerName".to_string(), order.partner_name.clone()),
                ("projectName".to_string(), order.project_name.clone()),
            ]),
        },
    )?;

    let updated =
        repo.update_order(order.id, user.hub_id, &UpdateOrder::new().status(OrderStatus::Pending));
    match updated {
        Ok(order) => Ok(SubmittedOrder { order, approval }),
        Err(err) => {
            // Do not leave an approval behind for an order that stayed a draft.
            let mut approval = approval;
            if approval.cancel(now()).is_ok() {
                match repo.save_approval(&approval, None) {
                    Ok(Some(_)) => log::warn!(
                        "Withdrew approval {} because order {} could not be submitted",
                        approval.id,
                        order.order_no
                    ),
                    Ok(None) => log::error!("Approval {} changed while withdrawing it", approval.id),
                    Err(save_err) => {
                        log::error!("Failed to withdraw approval {}: {save_err}", approval.id)
                    }
                }
            }
            Err(ServiceError::from(err))
        }
    }
}

/// Deadline alerts for orders that still have to be placed.
pub fn order_deadline_alerts<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: DeadlineAlertsQuery,
    today: NaiveDate,
) -> ServiceResult<DeadlineAlerts>
where
    R: OrderReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let (_total, orders) = repo
        .list_orders(OrderListQuery::new(user.hub_id))
        .map_err(ServiceError::from)?;

    let (alerts, stats) = deadline_alerts(&orders, today, query.severity);
    Ok(DeadlineAlerts { alerts, stats })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::alert::AlertSeverity;
    use crate::domain::approval::{NewApprovalInstance, RecordedAction};
    use crate::domain::approval_flow::{
        ApprovalFlow, ApprovalFlowListQuery, ApprovalStepMode,
    };
    use crate::domain::ledger::{ConstructionLedger, LedgerListQuery};
    use crate::domain::order::NewOrder;
    use crate::repository::mock::{
        MockApprovalFlowReader, MockApprovalReader, MockApprovalWriter, MockLedgerReader,
        MockOrderReader, MockOrderWriter,
    };
    use crate::services::test_support::{
        approver, fixed_datetime, flow, ledger, order, step, stored_instance, user_with_roles,
    };
    use pushkind_common::repository::errors::{RepositoryError, RepositoryResult};

    #[derive(Default)]
    struct FakeRepo {
        orders: MockOrderReader,
        order_writer: MockOrderWriter,
        ledgers: MockLedgerReader,
        flows: MockApprovalFlowReader,
        approvals: MockApprovalReader,
        approval_writer: MockApprovalWriter,
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
            self.order_writer.create_order(new_order)
        }

        fn update_order(
            &self,
            order_id: i32,
            hub_id: i32,
            updates: &UpdateOrder,
        ) -> RepositoryResult<Order> {
            self.order_writer.update_order(order_id, hub_id, updates)
        }

        fn delete_order(&self, order_id: i32, hub_id: i32) -> RepositoryResult<()> {
            self.order_writer.delete_order(order_id, hub_id)
        }

        fn record_dw_costs(
            &self,
            order_id: i32,
            hub_id: i32,
            updates: &UpdateOrder,
        ) -> RepositoryResult<(Order, Option<ConstructionLedger>)> {
            self.order_writer.record_dw_costs(order_id, hub_id, updates)
        }
    }

    impl LedgerReader for FakeRepo {
        fn get_ledger_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ConstructionLedger>> {
            self.ledgers.get_ledger_by_id(id, hub_id)
        }

        fn get_ledger_by_construction_no(
            &self,
            construction_no: &str,
            hub_id: i32,
        ) -> RepositoryResult<Option<ConstructionLedger>> {
            self.ledgers.get_ledger_by_construction_no(construction_no, hub_id)
        }

        fn list_ledgers(
            &self,
            query: LedgerListQuery,
        ) -> RepositoryResult<(usize, Vec<ConstructionLedger>)> {
            self.ledgers.list_ledgers(query)
        }
    }

    impl ApprovalFlowReader for FakeRepo {
        fn get_flow_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ApprovalFlow>> {
            self.flows.get_flow_by_id(id, hub_id)
        }

        fn list_flows(&self, query: ApprovalFlowListQuery) -> RepositoryResult<Vec<ApprovalFlow>> {
            self.flows.list_flows(query)
        }
    }

    impl ApprovalReader for FakeRepo {
        fn get_approval_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ApprovalInstance>> {
            self.approvals.get_approval_by_id(id, hub_id)
        }

        fn list_approvals(
            &self,
            query: ApprovalListQuery,
        ) -> RepositoryResult<(usize, Vec<ApprovalInstance>)> {
            self.approvals.list_approvals(query)
        }
    }

    impl ApprovalWriter for FakeRepo {
        fn create_approval(
            &self,
            new_instance: &NewApprovalInstance,
        ) -> RepositoryResult<Option<ApprovalInstance>> {
            self.approval_writer.create_approval(new_instance)
        }

        fn save_approval(
            &self,
            instance: &ApprovalInstance,
            action: Option<RecordedAction>,
        ) -> RepositoryResult<Option<ApprovalInstance>> {
            self.approval_writer.save_approval(instance, action)
        }
    }

    fn admin() -> AuthenticatedUser {
        user_with_roles(&[SERVICE_ACCESS_ROLE])
    }

    /// Pending purchase approval opened for order `order_id`.
    fn pending_approval(order_id: i32) -> ApprovalInstance {
        let new_instance = NewApprovalInstance::from_flow(
            &flow(
                1,
                DocumentType::Purchase,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
            ),
            ApprovalRequest {
                document_type: DocumentType::Purchase,
                document_id: order_id.to_string(),
                document_title: format!("PO-{order_id}"),
                amount_cents: Some(110_000),
                requested_by: approver("user-1"),
                attributes: HashMap::new(),
            },
            fixed_datetime(),
        )
        .expect("flow has steps");
        stored_instance(20, new_instance)
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn order_form(ledger_id: Option<i32>) -> AddOrderForm {
        AddOrderForm {
            ledger_id,
            order_no: "PO-77".to_string(),
            project_name: "Office renovation".to_string(),
            partner_name: "Tanaka Electric".to_string(),
            contract_signed_date: date(2024, 5, 1),
            work_items: Vec::new(),
            tax_rate: None,
            notes: None,
        }
    }

    #[test]
    fn create_order_uses_configured_deadline() {
        let mut repo = FakeRepo::default();
        repo.ledgers
            .expect_get_ledger_by_id()
            .times(1)
            .returning(|id, _| Ok(Some(ledger(id))));
        repo.orders
            .expect_get_order_by_no()
            .times(1)
            .returning(|_, _| Ok(None));
        repo.order_writer
            .expect_create_order()
            .times(1)
            .withf(|new_order| {
                new_order.order_deadline == NaiveDate::from_ymd_opt(2024, 5, 11).unwrap()
                    && new_order.ledger_id == Some(1)
            })
            .returning(|_| Ok(order(12, OrderStatus::Draft)));

        let created = create_order(&repo, &admin(), order_form(Some(1)), 10)
            .expect("expected success");

        assert_eq!(created.order.id, 12);
        assert_eq!(created.cost_analysis.budget_cents, 110_000);
    }

    #[test]
    fn create_order_rejects_foreign_ledger() {
        let mut repo = FakeRepo::default();
        repo.ledgers
            .expect_get_ledger_by_id()
            .returning(|_, _| Ok(None));
        repo.order_writer.expect_create_order().never();

        assert!(matches!(
            create_order(&repo, &admin(), order_form(Some(5)), 7),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn create_order_rejects_duplicate_number() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_no()
            .returning(|_, _| Ok(Some(order(1, OrderStatus::Draft))));
        repo.order_writer.expect_create_order().never();

        assert!(matches!(
            create_order(&repo, &admin(), order_form(None), 7),
            Err(ServiceError::Conflict)
        ));
    }

    #[test]
    fn status_change_follows_lifecycle() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Draft))));
        repo.order_writer.expect_update_order().never();

        let result = update_order_status(
            &repo,
            &admin(),
            1,
            UpdateOrderStatusPayload {
                status: OrderStatus::Completed,
            },
        );

        assert!(matches!(result, Err(ServiceError::Form(_))));
    }

    #[test]
    fn allowed_status_change_is_persisted() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Approved))));
        repo.order_writer
            .expect_update_order()
            .times(1)
            .withf(|id, hub_id, updates| {
                *id == 4 && *hub_id == 42 && updates.status == Some(OrderStatus::Cancelled)
            })
            .returning(|id, _, _| Ok(order(id, OrderStatus::Cancelled)));

        let updated = update_order_status(
            &repo,
            &admin(),
            4,
            UpdateOrderStatusPayload {
                status: OrderStatus::Cancelled,
            },
        )
        .expect("expected success");

        assert_eq!(updated.order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn delete_order_only_for_draft_or_cancelled() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Approved))));
        repo.order_writer.expect_delete_order().never();

        assert!(matches!(
            delete_order(&repo, &admin(), 1),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn manual_status_change_cannot_decide_approval() {
        for (from, to) in [
            (OrderStatus::Draft, OrderStatus::Pending),
            (OrderStatus::Pending, OrderStatus::Approved),
            (OrderStatus::Pending, OrderStatus::Rejected),
            (OrderStatus::Approved, OrderStatus::SentToDw),
        ] {
            let mut repo = FakeRepo::default();
            repo.orders
                .expect_get_order_by_id()
                .returning(move |id, _| Ok(Some(order(id, from))));
            repo.approvals.expect_list_approvals().never();
            repo.order_writer.expect_update_order().never();

            let result = update_order_status(&repo, &admin(), 1, UpdateOrderStatusPayload { status: to });
            assert!(matches!(result, Err(ServiceError::Form(_))), "{from:?} -> {to:?}");
        }
    }

    #[test]
    fn cancelling_pending_order_withdraws_its_approval() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Pending))));
        repo.approvals
            .expect_list_approvals()
            .times(1)
            .withf(|query| {
                query.document_type == Some(DocumentType::Purchase)
                    && query.document_id.as_deref() == Some("3")
                    && query.status == Some(ApprovalStatus::Pending)
            })
            .returning(|_| Ok((1, vec![pending_approval(3)])));
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .withf(|instance, action| {
                instance.id == 20 && instance.status == ApprovalStatus::Cancelled && action.is_none()
            })
            .returning(|instance, _| Ok(Some(instance.clone())));
        repo.order_writer
            .expect_update_order()
            .times(1)
            .withf(|_, _, updates| updates.status == Some(OrderStatus::Cancelled))
            .returning(|id, _, _| Ok(order(id, OrderStatus::Cancelled)));

        let updated = update_order_status(
            &repo,
            &admin(),
            3,
            UpdateOrderStatusPayload {
                status: OrderStatus::Cancelled,
            },
        )
        .expect("expected success");

        assert_eq!(updated.order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn withdrawing_a_concurrently_decided_approval_is_a_conflict() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Pending))));
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((1, vec![pending_approval(3)])));
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .returning(|_, _| Ok(None));
        repo.order_writer.expect_update_order().never();

        let result = update_order_status(
            &repo,
            &admin(),
            3,
            UpdateOrderStatusPayload {
                status: OrderStatus::Draft,
            },
        );

        assert!(matches!(result, Err(ServiceError::Conflict)));
    }

    #[test]
    fn delete_refuses_order_still_in_ledger_budget() {
        let mut repo = FakeRepo::default();
        repo.orders.expect_get_order_by_id().returning(|id, _| {
            let mut cancelled = order(id, OrderStatus::Cancelled);
            cancelled.budget_applied = true;
            Ok(Some(cancelled))
        });
        repo.order_writer.expect_delete_order().never();

        assert!(matches!(
            delete_order(&repo, &admin(), 1),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn delete_draft_order() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Draft))));
        repo.order_writer
            .expect_delete_order()
            .times(1)
            .withf(|id, hub_id| *id == 1 && *hub_id == 42)
            .returning(|_, _| Ok(()));

        assert!(delete_order(&repo, &admin(), 1).is_ok());
    }

    #[test]
    fn submit_opens_purchase_approval_and_marks_pending() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Draft))));
        repo.approvals
            .expect_list_approvals()
            .times(1)
            .withf(|query| {
                query.document_type == Some(DocumentType::Purchase)
                    && query.document_id.as_deref() == Some("3")
                    && query.status == Some(ApprovalStatus::Pending)
            })
            .returning(|_| Ok((0, Vec::new())));
        repo.flows.expect_list_flows().times(1).returning(|_| {
            Ok(vec![flow(
                1,
                DocumentType::Purchase,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
            )])
        });
        repo.approval_writer
            .expect_create_approval()
            .times(1)
            .withf(|new_instance| {
                new_instance.amount_cents == Some(110_000)
                    && new_instance.document_id == "3"
                    && new_instance.requested_by.id == "user-1"
            })
            .returning(|new_instance| Ok(Some(stored_instance(20, new_instance.clone()))));
        repo.order_writer
            .expect_update_order()
            .times(1)
            .withf(|_, _, updates| updates.status == Some(OrderStatus::Pending))
            .returning(|id, _, _| Ok(order(id, OrderStatus::Pending)));

        let submitted = submit_order_for_approval(&repo, &admin(), 3).expect("expected success");

        assert_eq!(submitted.order.status, OrderStatus::Pending);
        assert_eq!(submitted.approval.id, 20);
    }

    #[test]
    fn failed_submit_withdraws_the_new_approval() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Draft))));
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((0, Vec::new())));
        repo.flows.expect_list_flows().returning(|_| {
            Ok(vec![flow(
                1,
                DocumentType::Purchase,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
            )])
        });
        repo.approval_writer
            .expect_create_approval()
            .times(1)
            .withf(|new_instance| new_instance.document_id == "3")
            .returning(|new_instance| Ok(Some(stored_instance(20, new_instance.clone()))));
        repo.order_writer
            .expect_update_order()
            .times(1)
            .returning(|_, _, _| Err(RepositoryError::NotFound));
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .withf(|instance, action| {
                instance.id == 20 && instance.status == ApprovalStatus::Cancelled && action.is_none()
            })
            .returning(|instance, _| Ok(Some(instance.clone())));

        assert!(submit_order_for_approval(&repo, &admin(), 3).is_err());
    }

    #[test]
    fn concurrent_submit_is_a_conflict() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Draft))));
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((0, Vec::new())));
        repo.flows.expect_list_flows().returning(|_| {
            Ok(vec![flow(
                1,
                DocumentType::Purchase,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
            )])
        });
        repo.approval_writer
            .expect_create_approval()
            .times(1)
            .returning(|_| Ok(None));
        repo.order_writer.expect_update_order().never();

        assert!(matches!(
            submit_order_for_approval(&repo, &admin(), 3),
            Err(ServiceError::Conflict)
        ));
    }

    #[test]
    fn submit_without_matching_flow_is_a_form_error() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Draft))));
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((0, Vec::new())));
        repo.flows.expect_list_flows().returning(|_| Ok(Vec::new()));
        repo.approval_writer.expect_create_approval().never();
        repo.order_writer.expect_update_order().never();

        assert!(matches!(
            submit_order_for_approval(&repo, &admin(), 3),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn submit_rejects_non_draft_orders() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Pending))));

        assert!(matches!(
            submit_order_for_approval(&repo, &admin(), 3),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn deadline_alerts_cover_all_hub_orders() {
        let mut repo = FakeRepo::default();
        repo.orders
            .expect_list_orders()
            .times(1)
            .withf(|query| query.hub_id == 42 && query.pagination.is_none())
            .returning(|_| {
                // Both deadlines fall on 2024-01-17.
                Ok((
                    2,
                    vec![order(1, OrderStatus::Draft), order(2, OrderStatus::Completed)],
                ))
            });

        let result = order_deadline_alerts(
            &repo,
            &admin(),
            DeadlineAlertsQuery { severity: None },
            date(2024, 1, 15),
        )
        .expect("expected success");

        assert_eq!(result.stats.total, 1);
        assert_eq!(result.stats.warning, 1);
        assert_eq!(result.alerts[0].days_until_deadline, 2);
        assert_eq!(result.alerts[0].severity, AlertSeverity::Warning);
    }
}
