use feerecon_core::ids::{PaymentAccountId, RoutingSlipId};
use feerecon_core::model::{RoutingSlip, RoutingSlipStatus};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    pub async fn get_routing_slip_by_number(&self, number: &str) -> Result<Option<RoutingSlip>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                Ok(tables.lock().routing_slips.iter().find(|r| r.number == number).cloned())
            }
            Backend::Postgres(pool) => sqlx::query_as::<_, RoutingSlipRow>(
                "SELECT id, number, payment_account_id, parent_number, total, remaining_amount, status, \
                 routing_slip_date, gl_posted FROM routing_slips WHERE number = $1",
            )
            .bind(number)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(RoutingSlipRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.5 `link_routing_slips`: LINKED children whose `payment_account_id`
    /// has not yet been re-pointed to match their parent's.
    pub async fn list_unmigrated_linked_children(&self) -> Result<Vec<RoutingSlip>, ReconcileError> {
        let all = match self.backend.as_ref() {
            Backend::Memory(tables) => tables.lock().routing_slips.clone(),
            Backend::Postgres(pool) => sqlx::query_as::<_, RoutingSlipRow>(
                "SELECT id, number, payment_account_id, parent_number, total, remaining_amount, status, \
                 routing_slip_date, gl_posted FROM routing_slips WHERE status = 'LINKED'",
            )
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(RoutingSlipRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string()))?,
        };

        let mut out = Vec::new();
        for child in all.into_iter().filter(|r| r.status == RoutingSlipStatus::Linked) {
            let Some(parent_number) = &child.parent_number else { continue };
            if let Some(parent) = self.get_routing_slip_by_number(parent_number).await? {
                if parent.payment_account_id != child.payment_account_id {
                    out.push(child);
                }
            }
        }
        Ok(out)
    }

    pub async fn save_routing_slip(&self, slip: &RoutingSlip) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(s) = tables.routing_slips.iter_mut().find(|r| r.id == slip.id) {
                    *s = slip.clone();
                } else {
                    tables.routing_slips.push(slip.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "UPDATE routing_slips SET payment_account_id = $1, remaining_amount = $2, status = $3, \
                     gl_posted = $4 WHERE id = $5",
                )
                .bind(slip.payment_account_id.get())
                .bind(slip.remaining_amount)
                .bind(slip.status.as_code())
                .bind(slip.gl_posted)
                .bind(slip.id.get())
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoutingSlipRow {
    id: i64,
    number: String,
    payment_account_id: i64,
    parent_number: Option<String>,
    total: rust_decimal::Decimal,
    remaining_amount: rust_decimal::Decimal,
    status: String,
    routing_slip_date: chrono::DateTime<chrono::Utc>,
    gl_posted: Option<chrono::DateTime<chrono::Utc>>,
}

impl RoutingSlipRow {
    fn into_domain(self) -> RoutingSlip {
        RoutingSlip {
            id: RoutingSlipId::new(self.id),
            number: self.number,
            payment_account_id: PaymentAccountId::new(self.payment_account_id),
            parent_number: self.parent_number,
            total: self.total,
            remaining_amount: self.remaining_amount,
            status: match self.status.as_str() {
                "LINKED" => RoutingSlipStatus::Linked,
                "LINKED_EXPORTED" => RoutingSlipStatus::LinkedExported,
                "COMPLETE" => RoutingSlipStatus::Complete,
                "NSF_WARNING" => RoutingSlipStatus::NsfWarning,
                "CORRECTED" => RoutingSlipStatus::Corrected,
                "VOID" => RoutingSlipStatus::Void,
                "REJECTED" => RoutingSlipStatus::Rejected,
                _ => RoutingSlipStatus::Active,
            },
            routing_slip_date: self.routing_slip_date,
            gl_posted: self.gl_posted,
        }
    }
}
