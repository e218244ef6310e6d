//! Property tests for the default-address and primary-image invariants.
//!
//! Random sequences of create / update / set-default / delete operations run
//! against a real database; after every step a user with addresses has
//! exactly one default, and a product with images exactly one primary.

use bazaar_core::{AddressFields, NewProduct};
use bazaar_db::{Database, DbConfig};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Create { make_default: bool },
    Update { pick: usize, make_default: bool },
    SetDefault { pick: usize },
    Delete { pick: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<bool>().prop_map(|make_default| Op::Create { make_default }),
        2 => (any::<usize>(), any::<bool>())
            .prop_map(|(pick, make_default)| Op::Update { pick, make_default }),
        2 => any::<usize>().prop_map(|pick| Op::SetDefault { pick }),
        2 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
    ]
}

fn fields(n: usize) -> AddressFields {
    AddressFields {
        name: format!("Address {n}"),
        street: "9 Canal Street".to_string(),
        city: "Amsterdam".to_string(),
        state: "Noord-Holland".to_string(),
        postal_code: "1011 AA".to_string(),
        country: "NL".to_string(),
        phone: "+31 20 000 0000".to_string(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_one_default_address(ops in prop::collection::vec(op(), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let db = Database::new(DbConfig::in_memory()).await.unwrap();
            let user = db.catalog().create_user("Ana", "ana@example.com").await.unwrap().id;
            let repo = db.addresses();

            for (step, op) in ops.into_iter().enumerate() {
                let ids: Vec<i64> = repo.list(user).await.unwrap().iter().map(|a| a.id).collect();
                let pick = |i: usize| ids[i % ids.len()];

                match op {
                    Op::Create { make_default } => {
                        let created = repo.create(user, &fields(step), make_default).await.unwrap();
                        prop_assert_eq!(created.is_default, make_default || ids.is_empty());
                    }
                    Op::Update { pick: i, make_default } if !ids.is_empty() => {
                        let updated = repo.update(user, pick(i), &fields(step), make_default).await.unwrap();
                        if make_default || ids.len() == 1 {
                            prop_assert!(updated.is_default);
                        }
                    }
                    Op::SetDefault { pick: i } if !ids.is_empty() => {
                        repo.set_default(user, pick(i)).await.unwrap();
                    }
                    Op::Delete { pick: i } if !ids.is_empty() => {
                        let target = pick(i);
                        let was_default = repo.get(user, target).await.unwrap().unwrap().is_default;
                        let promoted = repo.delete(user, target).await.unwrap();

                        let newest_survivor = ids.iter().copied().filter(|id| *id != target).max();
                        if was_default {
                            prop_assert_eq!(promoted, newest_survivor);
                        } else {
                            prop_assert_eq!(promoted, None);
                        }
                    }
                    _ => {}
                }

                let after = repo.list(user).await.unwrap();
                let defaults = after.iter().filter(|a| a.is_default).count();
                prop_assert_eq!(defaults, usize::from(!after.is_empty()));
            }

            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_one_primary_image(ops in prop::collection::vec(op(), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let db = Database::new(DbConfig::in_memory()).await.unwrap();
            let product = db
                .catalog()
                .create_product(&NewProduct {
                    name: "Tote Bag".to_string(),
                    base_price_cents: 2_500,
                    ..Default::default()
                })
                .await
                .unwrap()
                .id;
            let repo = db.images();

            for (step, op) in ops.into_iter().enumerate() {
                let ids: Vec<i64> = repo.list(product).await.unwrap().iter().map(|i| i.id).collect();

                match op {
                    Op::Create { make_default } | Op::Update { make_default, .. } => {
                        let url = format!("https://cdn.test/tote-{step}.jpg");
                        repo.create(product, &url, make_default).await.unwrap();
                    }
                    Op::SetDefault { pick } if !ids.is_empty() => {
                        repo.set_primary(product, ids[pick % ids.len()]).await.unwrap();
                    }
                    Op::Delete { pick } if !ids.is_empty() => {
                        repo.delete(product, ids[pick % ids.len()]).await.unwrap();
                    }
                    _ => {}
                }

                let after = repo.list(product).await.unwrap();
                let primaries = after.iter().filter(|i| i.is_primary).count();
                prop_assert_eq!(primaries, usize::from(!after.is_empty()));
            }

            Ok::<(), TestCaseError>(())
        })?;
    }
}
