#![allow(dead_code)]

use custody_ledger::crypto::commit;
use custody_ledger::ledger::models::{Asset, Principal};
use custody_ledger::ledger::Ledger;
use custody_ledger::roles::{Role, RoleRegistry};
use custody_ledger::CustodyService;

pub fn principal(name: &str) -> Principal {
    Principal::new(name).expect("valid principal")
}

pub fn admin() -> Principal {
    principal("0xadmin")
}

pub fn factory() -> Principal {
    principal("0xfactory")
}

pub fn carrier() -> Principal {
    principal("0xcarrier")
}

pub fn shop() -> Principal {
    principal("0xshop")
}

pub fn consumer() -> Principal {
    principal("0xalice")
}

/// In-memory ledger with one principal per custody role
pub async fn setup_test_service() -> CustodyService {
    let ledger = Ledger::new_in_memory()
        .await
        .expect("Failed to create test ledger");
    let roles = RoleRegistry::new(ledger.clone());
    roles.bootstrap_admin(&admin()).await.expect("bootstrap admin");

    let service = CustodyService::new(ledger);
    for (role, who) in [
        (Role::Creator, factory()),
        (Role::Carrier, carrier()),
        (Role::Outlet, shop()),
    ] {
        service
            .grant_role(&admin(), role, &who)
            .await
            .expect("grant role");
    }
    service
}

/// "Watch-1" committed to consumer secret S0 and handover secret H1
pub async fn create_watch(service: &CustodyService) -> Asset {
    service
        .create_asset(&factory(), "Watch-1", commit("S0"), commit("H1"), "Factory-A")
        .await
        .expect("create Watch-1")
}
