use chrono::NaiveDateTime;
use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use pushkind_common::routes::check_role;
use serde::Serialize;

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::approval::{
    ApprovalError, ApprovalInstance, ApprovalListQuery, ApprovalRequest, ApprovalStats,
    ApprovalStatus, NewApprovalInstance, approval_stats as compute_stats,
};
use crate::domain::approval_flow::{
    ApprovalFlowListQuery, Approver, DocumentType, FlowRequest, select_flow,
};
use crate::domain::order::{OrderStatus, UpdateOrder};
use crate::forms::approvals::{
    ApprovalActionForm, ApprovalStatsQuery, ApprovalsQuery, RequestApprovalForm,
};
use crate::repository::{ApprovalFlowReader, ApprovalReader, ApprovalWriter, OrderReader, OrderWriter};
use crate::services::{ServiceError, ServiceResult};

/// Instances expired by a sweep.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ExpiredApprovals {
    pub expired: Vec<i32>,
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// The authenticated user as an approval participant.
pub(crate) fn requester(user: &AuthenticatedUser) -> Approver {
    Approver {
        id: user.sub.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
    }
}

/// Instantiate the flow matching `request` and persist the new instance.
pub(crate) fn open_approval<R>(
    repo: &R,
    hub_id: i32,
    request: ApprovalRequest,
) -> ServiceResult<ApprovalInstance>
where
    R: ApprovalFlowReader + ApprovalWriter + ?Sized,
{
    let flows = repo
        .list_flows(
            ApprovalFlowListQuery::new(hub_id)
                .document_type(request.document_type)
                .active(true),
        )
        .map_err(ServiceError::from)?;

    let flow_request = FlowRequest {
        document_type: request.document_type,
        amount_cents: request.amount_cents,
        attributes: request.attributes.clone(),
    };
    let flow = select_flow(&flows, &flow_request).ok_or_else(|| {
        ServiceError::Form(format!(
            "no approval flow matches this {} document",
            request.document_type.as_str()
        ))
    })?;

    let new_instance = NewApprovalInstance::from_flow(flow, request, now())
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    // `None` means another pending instance for the document won the insert.
    let instance = repo
        .create_approval(&new_instance)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::Conflict)?;
    log::info!(
        "Opened approval {} for {} {} using flow {}",
        instance.id,
        instance.document_type.as_str(),
        instance.document_id,
        instance.flow_name
    );
    Ok(instance)
}

fn load_approval<R>(repo: &R, hub_id: i32, approval_id: i32) -> ServiceResult<ApprovalInstance>
where
    R: ApprovalReader + ?Sized,
{
    repo.get_approval_by_id(approval_id, hub_id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)
}

fn has_pending_approval<R>(
    repo: &R,
    hub_id: i32,
    document_type: DocumentType,
    document_id: &str,
) -> ServiceResult<bool>
where
    R: ApprovalReader + ?Sized,
{
    let (count, _) = repo
        .list_approvals(
            ApprovalListQuery::new(hub_id)
                .document_type(document_type)
                .document_id(document_id)
                .status(ApprovalStatus::Pending),
        )
        .map_err(ServiceError::from)?;
    Ok(count > 0)
}

/// Move the purchase order behind a finished approval to the matching status.
/// Failures are logged; the approval outcome is already stored.
fn sync_purchase_order<R>(repo: &R, instance: &ApprovalInstance)
where
    R: OrderReader + OrderWriter + ?Sized,
{
    if instance.document_type != DocumentType::Purchase {
        return;
    }
    let target = match instance.status {
        ApprovalStatus::Approved => OrderStatus::Approved,
        ApprovalStatus::Rejected => OrderStatus::Rejected,
        ApprovalStatus::Cancelled | ApprovalStatus::Expired => OrderStatus::Draft,
        ApprovalStatus::Pending => return,
    };
    let Ok(order_id) = instance.document_id.parse::<i32>() else {
        log::warn!(
            "Approval {} references non-numeric order id {}",
            instance.id,
            instance.document_id
        );
        return;
    };

    let order = match repo.get_order_by_id(order_id, instance.hub_id) {
        Ok(Some(order)) => order,
        Ok(None) => {
            log::warn!("Order {order_id} of approval {} no longer exists", instance.id);
            return;
        }
        Err(err) => {
            log::error!("Failed to load order {order_id}: {err}");
            return;
        }
    };
    if order.status != OrderStatus::Pending {
        return;
    }

    if let Err(err) = repo.update_order(order.id, instance.hub_id, &UpdateOrder::new().status(target)) {
        log::error!(
            "Failed to move order {} to {}: {err}",
            order.order_no,
            target.as_str()
        );
    }
}

/// Opens an approval for a document using the best matching flow.
pub fn request_approval<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: RequestApprovalForm,
) -> ServiceResult<ApprovalInstance>
where
    R: ApprovalFlowReader + ApprovalReader + ApprovalWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let data = form
        .into_request()
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    if has_pending_approval(repo, user.hub_id, data.document_type, &data.document_id)? {
        return Err(ServiceError::Conflict);
    }

    open_approval(
        repo,
        user.hub_id,
        ApprovalRequest {
            document_type: data.document_type,
            document_id: data.document_id,
            document_title: data.document_title,
            amount_cents: data.amount_cents,
            requested_by: requester(user),
            attributes: data.attributes,
        },
    )
}

/// Records the user's decision on the current step of an approval.
///
/// The write only succeeds against the version that was read; a concurrent
/// decision turns into [`ServiceError::Conflict`]. A timed-out step expires
/// the instance and the decision is refused.
pub fn act_on_approval<R>(
    repo: &R,
    user: &AuthenticatedUser,
    approval_id: i32,
    form: ApprovalActionForm,
) -> ServiceResult<ApprovalInstance>
where
    R: ApprovalReader + ApprovalWriter + OrderReader + OrderWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let request = form
        .into_action_request()
        .map_err(|err| ServiceError::Form(err.to_string()))?;
    let mut instance = load_approval(repo, user.hub_id, approval_id)?;

    match instance.act(&requester(user), request, now()) {
        Ok(recorded) => {
            let saved = repo
                .save_approval(&instance, Some(recorded))
                .map_err(ServiceError::from)?
                .ok_or(ServiceError::Conflict)?;
            sync_purchase_order(repo, &saved);
            Ok(saved)
        }
        Err(ApprovalError::Expired) => {
            match repo.save_approval(&instance, None) {
                Ok(Some(saved)) => sync_purchase_order(repo, &saved),
                Ok(None) => log::warn!("Approval {approval_id} changed while expiring it"),
                Err(err) => log::error!("Failed to expire approval {approval_id}: {err}"),
            }
            Err(ServiceError::Form(ApprovalError::Expired.to_string()))
        }
        Err(err) => Err(ServiceError::Form(err.to_string())),
    }
}

/// Withdraws a pending approval.
pub fn cancel_approval<R>(
    repo: &R,
    user: &AuthenticatedUser,
    approval_id: i32,
) -> ServiceResult<ApprovalInstance>
where
    R: ApprovalReader + ApprovalWriter + OrderReader + OrderWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let mut instance = load_approval(repo, user.hub_id, approval_id)?;
    instance
        .cancel(now())
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    let saved = repo
        .save_approval(&instance, None)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::Conflict)?;
    sync_purchase_order(repo, &saved);
    Ok(saved)
}

/// Expires every pending approval of the hub whose current step timed out.
pub fn expire_overdue_approvals<R>(
    repo: &R,
    user: &AuthenticatedUser,
) -> ServiceResult<ExpiredApprovals>
where
    R: ApprovalReader + ApprovalWriter + OrderReader + OrderWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let (_, pending) = repo
        .list_approvals(ApprovalListQuery::new(user.hub_id).status(ApprovalStatus::Pending))
        .map_err(ServiceError::from)?;

    let now = now();
    let mut expired = Vec::new();
    for mut instance in pending {
        if !instance.expire_if_overdue(now) {
            continue;
        }
        match repo.save_approval(&instance, None).map_err(ServiceError::from)? {
            Some(saved) => {
                sync_purchase_order(repo, &saved);
                expired.push(saved.id);
            }
            None => log::warn!("Approval {} changed while expiring it", instance.id),
        }
    }

    Ok(ExpiredApprovals { expired })
}

/// Lists approvals of the hub, newest first.
pub fn list_approvals<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: ApprovalsQuery,
) -> ServiceResult<Paginated<ApprovalInstance>>
where
    R: ApprovalReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let page = query.page.unwrap_or(1);
    let mut list_query = ApprovalListQuery::new(user.hub_id).paginate(page, DEFAULT_ITEMS_PER_PAGE);
    if let Some(status) = query.status {
        list_query = list_query.status(status);
    }
    if let Some(document_type) = query.document_type {
        list_query = list_query.document_type(document_type);
    }
    if let Some(document_id) = query.document_id.filter(|id| !id.trim().is_empty()) {
        list_query = list_query.document_id(document_id.trim());
    }
    if let Some(requested_by) = query.requested_by.filter(|id| !id.trim().is_empty()) {
        list_query = list_query.requested_by(requested_by.trim());
    }

    let (total, items) = repo.list_approvals(list_query).map_err(ServiceError::from)?;

    Ok(Paginated::new(items, page, total.div_ceil(DEFAULT_ITEMS_PER_PAGE)))
}

/// Pending approvals whose current step waits for the user.
pub fn approval_inbox<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<Vec<ApprovalInstance>>
where
    R: ApprovalReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let (_, pending) = repo
        .list_approvals(ApprovalListQuery::new(user.hub_id).status(ApprovalStatus::Pending))
        .map_err(ServiceError::from)?;

    let now = now();
    Ok(pending
        .into_iter()
        .filter(|instance| !instance.is_overdue(now) && instance.awaits(&user.sub))
        .collect())
}

pub fn get_approval<R>(
    repo: &R,
    user: &AuthenticatedUser,
    approval_id: i32,
) -> ServiceResult<ApprovalInstance>
where
    R: ApprovalReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    load_approval(repo, user.hub_id, approval_id)
}

/// Outcome statistics over the hub's approvals.
pub fn approval_stats<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: ApprovalStatsQuery,
) -> ServiceResult<ApprovalStats>
where
    R: ApprovalReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let mut list_query = ApprovalListQuery::new(user.hub_id)
        .created_between(query.created_from, query.created_to);
    if let Some(document_type) = query.document_type {
        list_query = list_query.document_type(document_type);
    }

    let (_, instances) = repo.list_approvals(list_query).map_err(ServiceError::from)?;
    Ok(compute_stats(&instances))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::Duration;

    use crate::domain::approval::{ActionKind, RecordedAction, StepStatus};
    use crate::domain::approval_flow::{
        ApprovalCondition, ApprovalFlow, ApprovalStepMode, ConditionOperator,
    };
    use crate::domain::ledger::ConstructionLedger;
    use crate::domain::order::{NewOrder, Order, OrderListQuery};
    use crate::repository::mock::{
        MockApprovalFlowReader, MockApprovalReader, MockApprovalWriter, MockOrderReader,
        MockOrderWriter,
    };
    use crate::services::test_support::{admin_user, approver, flow, order, step, stored_instance};
    use pushkind_common::repository::errors::RepositoryResult;

    #[derive(Default)]
    struct FakeRepo {
        flows: MockApprovalFlowReader,
        approvals: MockApprovalReader,
        approval_writer: MockApprovalWriter,
        orders: MockOrderReader,
        order_writer: MockOrderWriter,
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

    /// Pending instance of a flow opened `age` ago.
    fn instance_of(
        id: i32,
        document_type: DocumentType,
        steps: Vec<crate::domain::approval_flow::ApprovalStepDefinition>,
        age: Duration,
    ) -> ApprovalInstance {
        let flow = flow(1, document_type, steps);
        let new_instance = NewApprovalInstance::from_flow(
            &flow,
            ApprovalRequest {
                document_type,
                document_id: "3".to_string(),
                document_title: "PO-3".to_string(),
                amount_cents: Some(110_000),
                requested_by: approver("requester"),
                attributes: HashMap::new(),
            },
            now() - age,
        )
        .expect("flow has steps");
        stored_instance(id, new_instance)
    }

    fn action(kind: ActionKind) -> ApprovalActionForm {
        ApprovalActionForm {
            action: kind,
            comment: Some("ok".to_string()),
            delegate_to: None,
        }
    }

    fn request_form() -> RequestApprovalForm {
        RequestApprovalForm {
            document_type: DocumentType::Estimate,
            document_id: "EST-1".to_string(),
            document_title: "Estimate".to_string(),
            amount_cents: Some(2_000_000),
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn request_approval_without_flow_is_a_form_error() {
        let mut repo = FakeRepo::default();
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((0, Vec::new())));
        repo.flows
            .expect_list_flows()
            .times(1)
            .withf(|query| {
                query.document_type == Some(DocumentType::Estimate) && query.is_active == Some(true)
            })
            .returning(|_| Ok(Vec::new()));
        repo.approval_writer.expect_create_approval().never();

        assert!(matches!(
            request_approval(&repo, &admin_user("u1"), request_form()),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn request_approval_starts_first_step() {
        let mut repo = FakeRepo::default();
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((0, Vec::new())));
        repo.flows.expect_list_flows().returning(|_| {
            Ok(vec![flow(
                4,
                DocumentType::Estimate,
                vec![
                    step(ApprovalStepMode::Serial, &["a"]),
                    step(ApprovalStepMode::Parallel, &["b", "c"]),
                ],
            )])
        });
        repo.approval_writer
            .expect_create_approval()
            .times(1)
            .withf(|new_instance| {
                new_instance.flow_id == Some(4)
                    && new_instance.requested_by.id == "u1"
                    && new_instance.steps[0].status == StepStatus::Pending
                    && new_instance.steps[0].timeout_at.is_some()
                    && new_instance.steps[1].status == StepStatus::Waiting
            })
            .returning(|new_instance| Ok(Some(stored_instance(8, new_instance.clone()))));

        let instance = request_approval(&repo, &admin_user("u1"), request_form())
            .expect("expected success");

        assert_eq!(instance.total_steps, 2);
        assert_eq!(instance.current_step, 1);
    }

    #[test]
    fn request_attributes_select_matching_flow() {
        let mut repo = FakeRepo::default();
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((0, Vec::new())));
        repo.flows.expect_list_flows().returning(|_| {
            let mut corporate = flow(7, DocumentType::Estimate, vec![step(ApprovalStepMode::Serial, &["cfo"])]);
            corporate.priority = 10;
            corporate.conditions = vec![ApprovalCondition {
                field: "customerType".to_string(),
                operator: ConditionOperator::Eq,
                value: "corporate".into(),
            }];
            let mut fallback = flow(4, DocumentType::Estimate, vec![step(ApprovalStepMode::Serial, &["a"])]);
            fallback.is_default = true;
            Ok(vec![corporate, fallback])
        });
        repo.approval_writer
            .expect_create_approval()
            .times(2)
            .returning(|new_instance| Ok(Some(stored_instance(8, new_instance.clone()))));

        let mut form = request_form();
        form.attributes
            .insert("customerType".to_string(), "corporate".to_string());
        let corporate = request_approval(&repo, &admin_user("u1"), form).expect("expected success");
        assert_eq!(corporate.flow_id, Some(7));

        let plain = request_approval(&repo, &admin_user("u1"), request_form())
            .expect("expected success");
        assert_eq!(plain.flow_id, Some(4));
    }

    #[test]
    fn losing_the_pending_insert_race_is_a_conflict() {
        let mut repo = FakeRepo::default();
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((0, Vec::new())));
        repo.flows.expect_list_flows().returning(|_| {
            Ok(vec![flow(4, DocumentType::Estimate, vec![step(ApprovalStepMode::Serial, &["a"])])])
        });
        repo.approval_writer
            .expect_create_approval()
            .times(1)
            .returning(|_| Ok(None));

        assert!(matches!(
            request_approval(&repo, &admin_user("u1"), request_form()),
            Err(ServiceError::Conflict)
        ));
    }

    #[test]
    fn duplicate_pending_request_is_a_conflict() {
        let mut repo = FakeRepo::default();
        repo.approvals
            .expect_list_approvals()
            .returning(|_| Ok((1, Vec::new())));
        repo.approval_writer.expect_create_approval().never();

        assert!(matches!(
            request_approval(&repo, &admin_user("u1"), request_form()),
            Err(ServiceError::Conflict)
        ));
    }

    #[test]
    fn final_approval_moves_purchase_order() {
        let mut repo = FakeRepo::default();
        repo.approvals.expect_get_approval_by_id().returning(|id, _| {
            Ok(Some(instance_of(
                id,
                DocumentType::Purchase,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
                Duration::hours(1),
            )))
        });
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .withf(|instance, action| {
                instance.status == ApprovalStatus::Approved
                    && instance.version == 1
                    && action.as_ref().is_some_and(|recorded| {
                        recorded.step_number == 1 && recorded.action.approver_id == "boss"
                    })
            })
            .returning(|instance, _| {
                let mut saved = instance.clone();
                saved.version += 1;
                Ok(Some(saved))
            });
        repo.orders
            .expect_get_order_by_id()
            .times(1)
            .withf(|id, hub_id| *id == 3 && *hub_id == 42)
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Pending))));
        repo.order_writer
            .expect_update_order()
            .times(1)
            .withf(|_, _, updates| updates.status == Some(OrderStatus::Approved))
            .returning(|id, _, _| Ok(order(id, OrderStatus::Approved)));

        let saved = act_on_approval(&repo, &admin_user("boss"), 5, action(ActionKind::Approved))
            .expect("expected success");

        assert_eq!(saved.status, ApprovalStatus::Approved);
        assert_eq!(saved.version, 2);
        assert!(saved.completed_at.is_some());
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let mut repo = FakeRepo::default();
        repo.approvals.expect_get_approval_by_id().returning(|id, _| {
            Ok(Some(instance_of(
                id,
                DocumentType::Estimate,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
                Duration::hours(1),
            )))
        });
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .returning(|_, _| Ok(None));
        repo.order_writer.expect_update_order().never();

        assert!(matches!(
            act_on_approval(&repo, &admin_user("boss"), 5, action(ActionKind::Approved)),
            Err(ServiceError::Conflict)
        ));
    }

    #[test]
    fn outsiders_cannot_act() {
        let mut repo = FakeRepo::default();
        repo.approvals.expect_get_approval_by_id().returning(|id, _| {
            Ok(Some(instance_of(
                id,
                DocumentType::Estimate,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
                Duration::hours(1),
            )))
        });
        repo.approval_writer.expect_save_approval().never();

        assert!(matches!(
            act_on_approval(&repo, &admin_user("intern"), 5, action(ActionKind::Approved)),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn timed_out_step_expires_instead_of_accepting_the_action() {
        let mut repo = FakeRepo::default();
        repo.approvals.expect_get_approval_by_id().returning(|id, _| {
            Ok(Some(instance_of(
                id,
                DocumentType::Estimate,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
                Duration::hours(48),
            )))
        });
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .withf(|instance, action| {
                instance.status == ApprovalStatus::Expired && action.is_none()
            })
            .returning(|instance, _| Ok(Some(instance.clone())));

        let result = act_on_approval(&repo, &admin_user("boss"), 5, action(ActionKind::Approved));

        assert!(matches!(result, Err(ServiceError::Form(message)) if message.contains("timed out")));
    }

    #[test]
    fn cancel_moves_purchase_order_back_to_draft() {
        let mut repo = FakeRepo::default();
        repo.approvals.expect_get_approval_by_id().returning(|id, _| {
            Ok(Some(instance_of(
                id,
                DocumentType::Purchase,
                vec![step(ApprovalStepMode::Serial, &["boss"])],
                Duration::hours(1),
            )))
        });
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .withf(|instance, action| {
                instance.status == ApprovalStatus::Cancelled
                    && instance.steps[0].status == StepStatus::Cancelled
                    && action.is_none()
            })
            .returning(|instance, _| Ok(Some(instance.clone())));
        repo.orders
            .expect_get_order_by_id()
            .returning(|id, _| Ok(Some(order(id, OrderStatus::Pending))));
        repo.order_writer
            .expect_update_order()
            .times(1)
            .withf(|_, _, updates| updates.status == Some(OrderStatus::Draft))
            .returning(|id, _, _| Ok(order(id, OrderStatus::Draft)));

        let cancelled = cancel_approval(&repo, &admin_user("requester"), 5).expect("expected success");

        assert_eq!(cancelled.status, ApprovalStatus::Cancelled);
    }

    #[test]
    fn inbox_lists_only_actionable_instances() {
        let mut repo = FakeRepo::default();
        repo.approvals
            .expect_list_approvals()
            .times(1)
            .withf(|query| query.status == Some(ApprovalStatus::Pending) && query.pagination.is_none())
            .returning(|_| {
                Ok((
                    3,
                    vec![
                        instance_of(
                            1,
                            DocumentType::Estimate,
                            vec![step(ApprovalStepMode::Serial, &["a", "b"])],
                            Duration::hours(1),
                        ),
                        instance_of(
                            2,
                            DocumentType::Estimate,
                            vec![step(ApprovalStepMode::Serial, &["b"])],
                            Duration::hours(1),
                        ),
                        instance_of(
                            3,
                            DocumentType::Estimate,
                            vec![step(ApprovalStepMode::Parallel, &["b"])],
                            Duration::hours(30),
                        ),
                    ],
                ))
            });

        let inbox = approval_inbox(&repo, &admin_user("b")).expect("expected success");

        let ids: Vec<i32> = inbox.iter().map(|instance| instance.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn expire_sweep_only_touches_overdue_instances() {
        let mut repo = FakeRepo::default();
        repo.approvals.expect_list_approvals().returning(|_| {
            Ok((
                2,
                vec![
                    instance_of(
                        1,
                        DocumentType::Estimate,
                        vec![step(ApprovalStepMode::Serial, &["a"])],
                        Duration::hours(30),
                    ),
                    instance_of(
                        2,
                        DocumentType::Estimate,
                        vec![step(ApprovalStepMode::Serial, &["a"])],
                        Duration::hours(1),
                    ),
                ],
            ))
        });
        repo.approval_writer
            .expect_save_approval()
            .times(1)
            .withf(|instance, _| instance.id == 1 && instance.status == ApprovalStatus::Expired)
            .returning(|instance, _| Ok(Some(instance.clone())));

        let result = expire_overdue_approvals(&repo, &admin_user("a")).expect("expected success");

        assert_eq!(result.expired, vec![1]);
    }

    #[test]
    fn stats_are_computed_over_filtered_instances() {
        let mut repo = FakeRepo::default();
        repo.approvals
            .expect_list_approvals()
            .times(1)
            .withf(|query| query.document_type == Some(DocumentType::Estimate))
            .returning(|_| {
                let mut approved = instance_of(
                    1,
                    DocumentType::Estimate,
                    vec![step(ApprovalStepMode::Serial, &["a"])],
                    Duration::hours(1),
                );
                approved.status = ApprovalStatus::Approved;
                approved.completed_at = Some(approved.created_at + Duration::hours(3));
                let pending = instance_of(
                    2,
                    DocumentType::Estimate,
                    vec![step(ApprovalStepMode::Serial, &["a"])],
                    Duration::hours(1),
                );
                Ok((2, vec![approved, pending]))
            });

        let stats = approval_stats(
            &repo,
            &admin_user("a"),
            ApprovalStatsQuery {
                document_type: Some(DocumentType::Estimate),
                created_from: None,
                created_to: None,
            },
        )
        .expect("expected success");

        assert_eq!(stats.total, 2);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.average_approval_hours, 3.0);
        assert_eq!(stats.approval_rate, 100.0);
    }
}
