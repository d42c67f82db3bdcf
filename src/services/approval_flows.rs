use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::routes::check_role;

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::approval_flow::ApprovalFlow;
use crate::forms::approval_flows::{ApprovalFlowForm, ApprovalFlowsQuery};
use crate::repository::{ApprovalFlowReader, ApprovalFlowWriter};
use crate::services::{ServiceError, ServiceResult};

/// Lists the hub's approval flows, highest priority first.
pub fn list_approval_flows<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: ApprovalFlowsQuery,
) -> ServiceResult<Vec<ApprovalFlow>>
where
    R: ApprovalFlowReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    repo.list_flows(query.into_list_query(user.hub_id))
        .map_err(ServiceError::from)
}

pub fn get_approval_flow<R>(
    repo: &R,
    user: &AuthenticatedUser,
    flow_id: i32,
) -> ServiceResult<ApprovalFlow>
where
    R: ApprovalFlowReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    repo.get_flow_by_id(flow_id, user.hub_id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)
}

/// Creates a flow together with its steps.
pub fn create_approval_flow<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: ApprovalFlowForm,
) -> ServiceResult<ApprovalFlow>
where
    R: ApprovalFlowWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let new_flow = form
        .into_new_flow(user.hub_id)
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    let flow = repo.create_flow(&new_flow).map_err(ServiceError::from)?;
    log::info!(
        "Created approval flow {} for {} documents",
        flow.id,
        flow.document_type.as_str()
    );
    Ok(flow)
}

/// Replaces a flow definition. Running instances keep the steps they were
/// started with.
pub fn update_approval_flow<R>(
    repo: &R,
    user: &AuthenticatedUser,
    flow_id: i32,
    form: ApprovalFlowForm,
) -> ServiceResult<ApprovalFlow>
where
    R: ApprovalFlowReader + ApprovalFlowWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let new_flow = form
        .into_new_flow(user.hub_id)
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    if repo
        .get_flow_by_id(flow_id, user.hub_id)
        .map_err(ServiceError::from)?
        .is_none()
    {
        return Err(ServiceError::NotFound);
    }

    repo.update_flow(flow_id, user.hub_id, &new_flow)
        .map_err(ServiceError::from)
}

pub fn delete_approval_flow<R>(
    repo: &R,
    user: &AuthenticatedUser,
    flow_id: i32,
) -> ServiceResult<()>
where
    R: ApprovalFlowReader + ApprovalFlowWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    if repo
        .get_flow_by_id(flow_id, user.hub_id)
        .map_err(ServiceError::from)?
        .is_none()
    {
        return Err(ServiceError::NotFound);
    }

    repo.delete_flow(flow_id, user.hub_id)
        .map_err(ServiceError::from)
}
