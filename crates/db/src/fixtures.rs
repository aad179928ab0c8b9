use chrono::Utc;
use rust_decimal::Decimal;

use offerdesk_core::cpq::margin::base_price;
use offerdesk_core::domain::client::{ClientDiscount, ClientId};
use offerdesk_core::domain::product::{
    PriceHistoryEntry, PriceSource, Product, ProductId, ProductMargin,
};
use offerdesk_core::domain::user::UserId;
use offerdesk_core::errors::StoreError;
use offerdesk_core::ports::PricingStore;

struct SeedProduct {
    id: &'static str,
    name: &'static str,
    unit: &'static str,
    /// Cost in hundredths.
    cost_cents: i64,
    margin_percent: i64,
    min_margin_percent: i64,
    max_discount_percent: i64,
}

const SEED_USER: &str = "demo-user";
const SEED_CLIENT: &str = "C-DEMO-001";

const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        id: "P-DEMO-001",
        name: "Steel beam HEB 200",
        unit: "m",
        cost_cents: 10000,
        margin_percent: 25,
        min_margin_percent: 10,
        max_discount_percent: 15,
    },
    SeedProduct {
        id: "P-DEMO-002",
        name: "Installation labour",
        unit: "h",
        cost_cents: 6000,
        margin_percent: 40,
        min_margin_percent: 20,
        max_discount_percent: 10,
    },
    SeedProduct {
        id: "P-DEMO-003",
        name: "Anchor bolt M16",
        unit: "pcs",
        cost_cents: 250,
        margin_percent: 60,
        min_margin_percent: 30,
        max_discount_percent: 20,
    },
];

/// Deterministic demo catalog: three products with margins for `demo-user`
/// and one windowless client discount on the first product.
pub struct DemoSeedDataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub products_seeded: Vec<&'static str>,
    pub user_id: &'static str,
    pub client_id: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub checks: Vec<(&'static str, bool)>,
    pub all_passed: bool,
}

impl DemoSeedDataset {
    pub async fn load<S: PricingStore>(store: &S) -> Result<SeedResult, StoreError> {
        let user = UserId(SEED_USER.to_string());
        let now = Utc::now();

        for seed in SEED_PRODUCTS {
            let product_id = ProductId(seed.id.to_string());
            store
                .save_product(Product {
                    id: product_id.clone(),
                    name: seed.name.to_string(),
                    unit: seed.unit.to_string(),
                    created_at: now,
                    last_used: now,
                })
                .await?;

            let cost_price = Decimal::new(seed.cost_cents, 2);
            let margin_percent = Decimal::from(seed.margin_percent);
            store
                .upsert_margin(
                    ProductMargin {
                        product_id: product_id.clone(),
                        user_id: user.clone(),
                        cost_price,
                        margin_percent,
                        min_margin_percent: Decimal::from(seed.min_margin_percent),
                        max_discount_percent: Decimal::from(seed.max_discount_percent),
                        updated_at: now,
                    },
                    PriceHistoryEntry {
                        product_id,
                        user_id: user.clone(),
                        price: base_price(Some(cost_price), margin_percent),
                        cost_price: Some(cost_price),
                        margin_percent: Some(margin_percent),
                        source: PriceSource::Configuration,
                        recorded_at: now,
                    },
                )
                .await?;
        }

        store
            .save_client_discount(ClientDiscount {
                client_id: ClientId(SEED_CLIENT.to_string()),
                product_id: ProductId(SEED_PRODUCTS[0].id.to_string()),
                discount_percent: Decimal::from(10),
                valid_from: None,
                valid_until: None,
                updated_at: now,
            })
            .await?;

        Ok(SeedResult {
            products_seeded: SEED_PRODUCTS.iter().map(|seed| seed.id).collect(),
            user_id: SEED_USER,
            client_id: SEED_CLIENT,
        })
    }

    pub async fn verify<S: PricingStore>(store: &S) -> Result<VerificationResult, StoreError> {
        let user = UserId(SEED_USER.to_string());
        let mut checks = Vec::with_capacity(SEED_PRODUCTS.len() + 1);

        for seed in SEED_PRODUCTS {
            let product_id = ProductId(seed.id.to_string());
            let product = store.find_product(&product_id).await?;
            let margin = store.get_margin(&product_id, &user).await?;
            checks.push((seed.id, product.is_some() && margin.is_some()));
        }

        let discount = store
            .get_client_discount(
                &ClientId(SEED_CLIENT.to_string()),
                &ProductId(SEED_PRODUCTS[0].id.to_string()),
                Utc::now().date_naive(),
            )
            .await?;
        checks.push((SEED_CLIENT, discount.is_some()));

        let all_passed = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { checks, all_passed })
    }
}
