//! Routing-slip-link task (§4.5): fold a LINKED child routing slip's CFS
//! receipt into its parent once the two have been tied together, so the
//! parent's account carries the balance CFS-side as well as ours. Grounded
//! on `examples/original_source/jobs/payment-jobs/tasks/routing_slip_task.py`'s
//! `RoutingSlipTask.link_routing_slips`.

use feerecon_core::model::PaymentMethod;
use feerecon_core::{ReconcileError, TaskContext};
use feerecon_storage::Store;

pub async fn link_routing_slips(ctx: &TaskContext<Store>) -> Result<usize, ReconcileError> {
    let children = ctx.store.list_unmigrated_linked_children().await?;
    let mut linked = 0;
    for child in children {
        match link_one(ctx, &child).await {
            Ok(()) => linked += 1,
            Err(e) => {
                tracing::error!(routing_slip = %child.number, error = %e, "error linking routing slip");
            }
        }
    }
    Ok(linked)
}

async fn link_one(ctx: &TaskContext<Store>, child: &feerecon_core::model::RoutingSlip) -> Result<(), ReconcileError> {
    let parent_number = child
        .parent_number
        .as_ref()
        .ok_or_else(|| ReconcileError::validation(format!("routing slip {} has no parent", child.number)))?;
    let parent = ctx
        .store
        .get_routing_slip_by_number(parent_number)
        .await?
        .ok_or_else(|| ReconcileError::validation(format!("parent routing slip {parent_number} not found")))?;
    let parent_account = ctx
        .store
        .get_payment_account(parent.payment_account_id)
        .await?
        .ok_or_else(|| ReconcileError::validation(format!("payment account {} not found", parent.payment_account_id)))?;
    let parent_cfs_account = ctx
        .store
        .get_effective_cfs_account(parent_account.id, PaymentMethod::Internal)
        .await?
        .ok_or_else(|| ReconcileError::validation(format!("no effective CFS account for {}", parent_account.id)))?;

    if let Some(child_cfs_account) = ctx
        .store
        .get_effective_cfs_account(child.payment_account_id, PaymentMethod::Internal)
        .await?
    {
        // A routing slip's deposit receipt is applied under its own number,
        // with no separate CFS invoice; unapply by that same number.
        ctx.cfs_client
            .unapply_receipt(child_cfs_account.id, &child.number, &child.number)
            .await?;
        let mut inactive = child_cfs_account.clone();
        inactive.status = feerecon_core::model::CfsAccountStatus::Inactive;
        ctx.store.save_cfs_account(&inactive).await?;
    }

    ctx.cfs_client
        .apply_receipt(parent_cfs_account.id, &parent.number, &child.linked_receipt_number())
        .await?;

    let mut next = child.clone();
    next.payment_account_id = parent.payment_account_id;
    ctx.store.save_routing_slip(&next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use feerecon_cfs_client::MockCfsClient;
    use feerecon_core::ids::{CfsAccountId, PaymentAccountId, RoutingSlipId};
    use feerecon_core::model::{CfsAccount, CfsAccountStatus, PaymentAccount, RoutingSlip, RoutingSlipStatus};
    use feerecon_core::Money;
    use std::sync::Arc;

    fn ctx(store: Store) -> TaskContext<Store> {
        TaskContext::new(
            Arc::new(feerecon_core::config::Settings::from_env()),
            Arc::new(feerecon_core::clock::FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())),
            Arc::new(MockCfsClient::new()),
            Arc::new(feerecon_bus::MockEventBus::new()),
            Arc::new(feerecon_objectstore::MockObjectStore::new()),
            store,
        )
    }

    async fn account(store: &Store, id: i64, name: &str) {
        store
            .save_payment_account(&PaymentAccount {
                id: PaymentAccountId(id),
                auth_account_id: format!("A{id}"),
                name: name.to_string(),
                pad_credit: Money::ZERO,
                ob_credit: Money::ZERO,
                eft_credit: Money::ZERO,
                has_nsf_invoices: None,
                has_overdue_invoices: None,
                pad_activation_date: None,
            })
            .await
            .unwrap();
    }

    async fn cfs_account(store: &Store, id: i64, account_id: i64) {
        store
            .save_cfs_account(&CfsAccount {
                id: CfsAccountId(id),
                payment_account_id: PaymentAccountId(account_id),
                cfs_party: format!("P{id}"),
                cfs_site: format!("S{id}"),
                cfs_account: format!("AC{id}"),
                status: CfsAccountStatus::Active,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn links_child_into_parent_and_repoints_account() {
        let store = Store::new_in_memory();
        account(&store, 1, "Parent").await;
        account(&store, 2, "Child").await;
        cfs_account(&store, 1, 1).await;
        cfs_account(&store, 2, 2).await;

        store
            .save_routing_slip(&RoutingSlip {
                id: RoutingSlipId(1),
                number: "RS0001".into(),
                payment_account_id: PaymentAccountId(1),
                parent_number: None,
                total: Money::new(10000, 2),
                remaining_amount: Money::new(10000, 2),
                status: RoutingSlipStatus::Active,
                routing_slip_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                gl_posted: None,
            })
            .await
            .unwrap();
        store
            .save_routing_slip(&RoutingSlip {
                id: RoutingSlipId(2),
                number: "RS0002".into(),
                payment_account_id: PaymentAccountId(2),
                parent_number: Some("RS0001".into()),
                total: Money::new(5000, 2),
                remaining_amount: Money::new(5000, 2),
                status: RoutingSlipStatus::Linked,
                routing_slip_date: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                gl_posted: None,
            })
            .await
            .unwrap();

        let ctx = ctx(store.clone());
        let linked = link_routing_slips(&ctx).await.unwrap();
        assert_eq!(linked, 1);

        let child = store.get_routing_slip_by_number("RS0002").await.unwrap().unwrap();
        assert_eq!(child.payment_account_id, PaymentAccountId(1));
        assert_eq!(child.status, RoutingSlipStatus::Linked);

        let child_cfs = store
            .get_effective_cfs_account(PaymentAccountId(2), PaymentMethod::Internal)
            .await
            .unwrap();
        assert!(child_cfs.is_none(), "child CFS account should no longer be effective (now INACTIVE)");
    }

    #[tokio::test]
    async fn already_migrated_children_are_not_relinked() {
        let store = Store::new_in_memory();
        account(&store, 1, "Parent").await;
        account(&store, 2, "Child").await;
        cfs_account(&store, 1, 1).await;

        store
            .save_routing_slip(&RoutingSlip {
                id: RoutingSlipId(1),
                number: "RS0001".into(),
                payment_account_id: PaymentAccountId(1),
                parent_number: None,
                total: Money::new(10000, 2),
                remaining_amount: Money::new(10000, 2),
                status: RoutingSlipStatus::Active,
                routing_slip_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                gl_posted: None,
            })
            .await
            .unwrap();
        store
            .save_routing_slip(&RoutingSlip {
                id: RoutingSlipId(2),
                number: "RS0002".into(),
                payment_account_id: PaymentAccountId(1),
                parent_number: Some("RS0001".into()),
                total: Money::new(5000, 2),
                remaining_amount: Money::new(5000, 2),
                status: RoutingSlipStatus::Linked,
                routing_slip_date: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                gl_posted: None,
            })
            .await
            .unwrap();

        let ctx = ctx(store.clone());
        let linked = link_routing_slips(&ctx).await.unwrap();
        assert_eq!(linked, 0);
    }
}
