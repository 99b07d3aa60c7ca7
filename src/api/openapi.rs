//! OpenAPI document covering every REST endpoint.

use utoipa::OpenApi;

use super::handlers::{admin, domains, messages, rebalance, system, vault};

/// Generated OpenAPI description of the vault API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "meridian-vault",
        description = "Cross-domain stablecoin yield vault: share accounting, child-vault registry, rebalancing and fee accrual."
    ),
    paths(
        system::health_handler,
        system::vault_health_handler,
        vault::get_vault,
        vault::preview,
        vault::deposit,
        vault::mint,
        vault::withdraw,
        vault::redeem,
        vault::transfer_shares,
        vault::get_account,
        vault::approve,
        vault::faucet,
        domains::list_domains,
        domains::register_domain,
        domains::get_domain,
        domains::retire_domain,
        domains::deploy,
        domains::recall,
        domains::report_yield,
        domains::pending_recalls,
        messages::deliver_inbound,
        messages::outbound_messages,
        messages::transfers,
        rebalance::preview_rebalance,
        rebalance::rebalance,
        rebalance::manual_rebalance,
        rebalance::collect_fees,
        rebalance::propose_fee,
        rebalance::execute_fee,
        rebalance::cancel_fee,
        admin::pause,
        admin::unpause,
        admin::grant_role,
        admin::revoke_role,
        admin::update_params,
    ),
    tags(
        (name = "System", description = "Liveness and vault health"),
        (name = "Vault", description = "Deposits, withdrawals and share accounting"),
        (name = "Domains", description = "Child vault registry and capital movement"),
        (name = "Messages", description = "Cross-domain message relay"),
        (name = "Rebalance", description = "Yield-driven reallocation"),
        (name = "Fees", description = "Management fee accrual and timelocked rate changes"),
        (name = "Admin", description = "Emergency pause, roles and parameters"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_core_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/vault/deposit",
            "/api/v1/domains/{id}/deploy",
            "/api/v1/messages/inbound",
            "/api/v1/fees/proposal",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
