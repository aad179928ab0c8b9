//! End-to-end pricing and quote flows, run against the SQLite adapter and the
//! in-memory adapter so both honor the same unit-of-work contract.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use offerdesk_core::cpq::line::{compute_line, LineInput};
use offerdesk_core::cpq::margin::{MarginFloorStatus, MarginPolicy};
use offerdesk_core::domain::client::{ClientId, ClientSnapshot};
use offerdesk_core::domain::product::{PriceSource, Product, ProductId};
use offerdesk_core::domain::quote::{Quote, QuoteId, QuoteLine, QuoteStatus};
use offerdesk_core::domain::user::UserId;
use offerdesk_core::errors::{ApplicationError, DomainError, StoreError, ValidationError};
use offerdesk_core::ports::PricingStore;
use offerdesk_core::services::{
    DiscountRequest, NewQuote, PricingConfigRequest, PricingService, QuoteService,
};
use offerdesk_core::QuoteTotals;
use offerdesk_db::{connect_with_settings, migrations, InMemoryPricingStore, SqlPricingStore};

macro_rules! for_both_stores {
    ($scenario:ident) => {
        mod $scenario {
            #[tokio::test]
            async fn sqlite() {
                super::$scenario(super::sqlite_store().await).await;
            }

            #[tokio::test]
            async fn memory() {
                super::$scenario(super::memory_store()).await;
            }
        }
    };
}

async fn sqlite_store() -> Arc<SqlPricingStore> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    Arc::new(SqlPricingStore::new(pool))
}

fn memory_store() -> Arc<InMemoryPricingStore> {
    Arc::new(InMemoryPricingStore::new())
}

fn user() -> UserId {
    UserId("u-anna".to_string())
}

fn dec(value: i64, scale: u32) -> Decimal {
    Decimal::new(value, scale)
}

async fn seed_product<S: PricingStore>(store: &S, id: &str, name: &str, unit: &str) -> ProductId {
    let now = Utc::now();
    let product_id = ProductId(id.to_string());
    store
        .save_product(Product {
            id: product_id.clone(),
            name: name.to_string(),
            unit: unit.to_string(),
            created_at: now,
            last_used: now,
        })
        .await
        .expect("save product");
    product_id
}

fn config(product_id: &ProductId, cost: i64, margin: i64) -> PricingConfigRequest {
    PricingConfigRequest {
        product_id: product_id.clone(),
        cost_price: Decimal::from(cost),
        margin_percent: Decimal::from(margin),
        min_margin_percent: None,
        max_discount_percent: None,
    }
}

fn line(name: &str, unit: &str, quantity: Decimal, price: Decimal, vat: i64) -> LineInput {
    LineInput {
        product_name: name.to_string(),
        unit: unit.to_string(),
        quantity,
        unit_price: price,
        vat_rate: Decimal::from(vat),
        cost_price: None,
        margin_percent: None,
        discount_percent: None,
        original_price: None,
    }
}

fn new_quote(lines: Vec<LineInput>, additional_costs: Decimal) -> NewQuote {
    NewQuote {
        client_id: Some(ClientId("C-ACME".to_string())),
        client: ClientSnapshot {
            name: "Acme Sp. z o.o.".to_string(),
            email: Some("buyer@acme.example".to_string()),
            phone: None,
        },
        lines,
        additional_costs,
        additional_costs_description: Some("Transport".to_string()),
        delivery_days: 14,
        valid_days: 30,
    }
}

async fn configuration_appends_history_even_when_unchanged<S: PricingStore>(store: Arc<S>) {
    let product = seed_product(store.as_ref(), "P-1", "Steel beam", "m").await;
    let service = PricingService::new(store, MarginPolicy::default());

    let first = service.configure(&user(), config(&product, 100, 25)).await.expect("configure");
    assert_eq!(first.base_price, Decimal::from(125));
    assert_eq!(first.margin.min_margin_percent, Decimal::from(10));
    assert_eq!(first.margin.max_discount_percent, Decimal::from(15));

    service.configure(&user(), config(&product, 100, 25)).await.expect("reconfigure");

    let history = service.price_history(&user(), &product, 10).await.expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|entry| entry.source == PriceSource::Configuration));
    assert!(history.iter().all(|entry| entry.price == Decimal::from(125)));

    let resolution = service
        .lookup(&user(), &product, None, Utc::now().date_naive())
        .await
        .expect("lookup");
    assert!(resolution.configured);
    assert_eq!(resolution.final_price, Decimal::from(125));
    assert_eq!(resolution.final_margin, Decimal::from(25));
    assert_eq!(resolution.margin_floor, MarginFloorStatus::Ok);
}
for_both_stores!(configuration_appends_history_even_when_unchanged);

async fn reconfiguration_keeps_stored_limits<S: PricingStore>(store: Arc<S>) {
    let product = seed_product(store.as_ref(), "P-1", "Steel beam", "m").await;
    let service = PricingService::new(store, MarginPolicy::default());

    let mut request = config(&product, 100, 25);
    request.max_discount_percent = Some(Decimal::from(30));
    service.configure(&user(), request).await.expect("configure with ceiling");

    let updated = service.configure(&user(), config(&product, 120, 20)).await.expect("update");
    assert_eq!(updated.margin.max_discount_percent, Decimal::from(30));
    assert_eq!(updated.base_price, Decimal::from(144));
}
for_both_stores!(reconfiguration_keeps_stored_limits);

async fn rejected_discount_is_not_persisted<S: PricingStore>(store: Arc<S>) {
    let product = seed_product(store.as_ref(), "P-1", "Steel beam", "m").await;
    let service = PricingService::new(store, MarginPolicy::default());
    service.configure(&user(), config(&product, 100, 25)).await.expect("configure");
    let client = ClientId("C-ACME".to_string());

    let error = service
        .configure_discount(
            &user(),
            DiscountRequest {
                client_id: client.clone(),
                product_id: product.clone(),
                discount_percent: Decimal::from(20),
                valid_from: None,
                valid_until: None,
            },
        )
        .await
        .expect_err("20% is above the 15% ceiling");
    assert_eq!(
        error,
        ApplicationError::Domain(DomainError::Validation(ValidationError::DiscountAboveCeiling {
            requested: Decimal::from(20),
            max: Decimal::from(15),
        }))
    );
    assert!(error.to_string().contains("maximum discount is 15%"));

    let today = Utc::now().date_naive();
    let resolution =
        service.lookup(&user(), &product, Some(&client), today).await.expect("lookup");
    assert_eq!(resolution.client_discount, Decimal::ZERO);
    assert_eq!(resolution.final_price, Decimal::from(125));

    service
        .configure_discount(
            &user(),
            DiscountRequest {
                client_id: client.clone(),
                product_id: product.clone(),
                discount_percent: Decimal::from(15),
                valid_from: None,
                valid_until: None,
            },
        )
        .await
        .expect("ceiling itself is accepted");

    let resolution =
        service.lookup(&user(), &product, Some(&client), today).await.expect("lookup");
    assert_eq!(resolution.client_discount, Decimal::from(15));
    assert_eq!(resolution.final_price, dec(10625, 2));
    assert_eq!(resolution.final_margin, dec(625, 2));
    assert_eq!(resolution.margin_floor, MarginFloorStatus::BelowFloor);
    assert!(resolution.discount_within_ceiling);
}
for_both_stores!(rejected_discount_is_not_persisted);

async fn discount_window_filters_lookup<S: PricingStore>(store: Arc<S>) {
    let product = seed_product(store.as_ref(), "P-1", "Steel beam", "m").await;
    let service = PricingService::new(store, MarginPolicy::default());
    service.configure(&user(), config(&product, 50, 20)).await.expect("configure");
    let client = ClientId("C-ACME".to_string());
    let today = Utc::now().date_naive();

    service
        .configure_discount(
            &user(),
            DiscountRequest {
                client_id: client.clone(),
                product_id: product.clone(),
                discount_percent: Decimal::from(5),
                valid_from: Some(today + Duration::days(1)),
                valid_until: None,
            },
        )
        .await
        .expect("future discount");

    let before = service.lookup(&user(), &product, Some(&client), today).await.expect("lookup");
    assert_eq!(before.client_discount, Decimal::ZERO);
    assert_eq!(before.final_price, Decimal::from(60));

    let tomorrow = today + Duration::days(1);
    let during =
        service.lookup(&user(), &product, Some(&client), tomorrow).await.expect("lookup");
    assert_eq!(during.client_discount, Decimal::from(5));
    assert_eq!(during.final_price, Decimal::from(57));
    assert_eq!(during.final_margin, Decimal::from(14));
}
for_both_stores!(discount_window_filters_lookup);

async fn unconfigured_product_uses_defaults<S: PricingStore>(store: Arc<S>) {
    let product = seed_product(store.as_ref(), "P-1", "Consulting", "h").await;
    let service = PricingService::new(store, MarginPolicy::default());

    let resolution = service
        .lookup(&user(), &product, None, Utc::now().date_naive())
        .await
        .expect("lookup");
    assert!(!resolution.configured);
    assert_eq!(resolution.base_price, Decimal::ZERO);
    assert_eq!(resolution.final_margin, Decimal::ZERO);
    assert_eq!(resolution.margin_percent, Decimal::from(25));
    assert_eq!(resolution.margin_floor, MarginFloorStatus::Unknown);

    let missing = service
        .lookup(&user(), &ProductId("P-404".to_string()), None, Utc::now().date_naive())
        .await
        .expect_err("unknown product");
    assert!(matches!(missing, ApplicationError::NotFound { entity: "product", .. }));
}
for_both_stores!(unconfigured_product_uses_defaults);

async fn quote_creation_persists_lines_and_totals<S: PricingStore>(store: Arc<S>) {
    let quotes = QuoteService::new(Arc::clone(&store), MarginPolicy::default());
    let pricing = PricingService::new(Arc::clone(&store), MarginPolicy::default());

    let quote = quotes
        .create(
            &user(),
            new_quote(
                vec![
                    line("Switch", "pcs", Decimal::from(2), Decimal::from(10), 23),
                    line("Manual", "pcs", Decimal::ONE, dec(9999, 2), 8),
                ],
                Decimal::from(50),
            ),
        )
        .await
        .expect("create quote");

    assert_eq!(quote.status, QuoteStatus::Draft);
    assert_eq!(quote.totals.total_net, dec(16999, 2));
    assert_eq!(quote.totals.total_vat, dec(2410, 2));
    assert_eq!(quote.totals.total_gross, dec(19409, 2));

    let stored = quotes.find(&quote.id).await.expect("stored quote");
    assert_eq!(stored.lines.len(), 2);
    assert_eq!(stored.lines[1].amounts.vat, Decimal::from(8));
    assert_eq!(stored.totals, quote.totals);
    quotes.verify_totals(&quote.id).await.expect("totals match lines");

    let switch = store
        .find_product_by_identity("SWITCH", "PCS")
        .await
        .expect("lookup")
        .expect("product created by quote");
    let history = pricing.price_history(&user(), &switch.id, 5).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].source, PriceSource::QuoteLine);
    assert_eq!(history[0].price, Decimal::from(10));

    let suggestions = pricing.suggest_products(&user(), "swi", 10).await.expect("suggest");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].last_price, Some(Decimal::from(10)));
}
for_both_stores!(quote_creation_persists_lines_and_totals);

async fn second_quote_reuses_product_identity<S: PricingStore>(store: Arc<S>) {
    let quotes = QuoteService::new(Arc::clone(&store), MarginPolicy::default());
    let pricing = PricingService::new(Arc::clone(&store), MarginPolicy::default());

    quotes
        .create(&user(), new_quote(vec![line("Cable", "m", Decimal::ONE, dec(450, 2), 23)], Decimal::ZERO))
        .await
        .expect("first quote");
    quotes
        .create(&user(), new_quote(vec![line(" cable ", "M", Decimal::ONE, dec(475, 2), 23)], Decimal::ZERO))
        .await
        .expect("second quote");

    let suggestions = pricing.suggest_products(&user(), "cab", 10).await.expect("suggest");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].product.name, "Cable");
    assert_eq!(suggestions[0].last_price, Some(dec(475, 2)));
}
for_both_stores!(second_quote_reuses_product_identity);

async fn costed_quote_line_refreshes_margin_timestamp<S: PricingStore>(store: Arc<S>) {
    let product = seed_product(store.as_ref(), "P-1", "Steel beam", "m").await;
    let pricing = PricingService::new(Arc::clone(&store), MarginPolicy::default());
    let quotes = QuoteService::new(Arc::clone(&store), MarginPolicy::default());
    pricing.configure(&user(), config(&product, 100, 25)).await.expect("configure");
    let configured = store.get_margin(&product, &user()).await.expect("margin").expect("row");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let uncosted = line("Steel beam", "m", Decimal::ONE, Decimal::from(125), 23);
    quotes.create(&user(), new_quote(vec![uncosted], Decimal::ZERO)).await.expect("uncosted quote");
    let untouched = store.get_margin(&product, &user()).await.expect("margin").expect("row");
    assert_eq!(untouched.updated_at, configured.updated_at);

    let mut costed = line("steel beam", "M", Decimal::ONE, Decimal::from(125), 23);
    costed.cost_price = Some(Decimal::from(100));
    costed.margin_percent = Some(Decimal::from(25));
    let quote = quotes.create(&user(), new_quote(vec![costed], Decimal::ZERO)).await.expect("costed quote");

    let refreshed = store.get_margin(&product, &user()).await.expect("margin").expect("row");
    assert!(refreshed.updated_at > configured.updated_at);
    assert!(refreshed.updated_at <= quote.created_at);
    assert_eq!(refreshed.cost_price, Decimal::from(100));
    assert_eq!(refreshed.max_discount_percent, Decimal::from(15));
}
for_both_stores!(costed_quote_line_refreshes_margin_timestamp);

async fn quote_line_discount_above_ceiling_blocks_save<S: PricingStore>(store: Arc<S>) {
    let product = seed_product(store.as_ref(), "P-1", "Steel beam", "m").await;
    let pricing = PricingService::new(Arc::clone(&store), MarginPolicy::default());
    let quotes = QuoteService::new(Arc::clone(&store), MarginPolicy::default());
    pricing.configure(&user(), config(&product, 100, 25)).await.expect("configure");

    let mut discounted = line("steel beam", "m", Decimal::ONE, dec(10000, 2), 23);
    discounted.cost_price = Some(Decimal::from(100));
    discounted.discount_percent = Some(Decimal::from(20));
    discounted.original_price = Some(Decimal::from(125));

    let error = quotes
        .create(&user(), new_quote(vec![discounted], Decimal::ZERO))
        .await
        .expect_err("discount above ceiling");
    assert!(matches!(
        error,
        ApplicationError::Domain(DomainError::Validation(
            ValidationError::DiscountAboveCeiling { .. }
        ))
    ));

    let history = pricing.price_history(&user(), &product, 10).await.expect("history");
    assert!(history.iter().all(|entry| entry.source == PriceSource::Configuration));
}
for_both_stores!(quote_line_discount_above_ceiling_blocks_save);

async fn status_lifecycle_and_unknown_status<S: PricingStore>(store: Arc<S>) {
    let quotes = QuoteService::new(store, MarginPolicy::default());
    let quote = quotes
        .create(&user(), new_quote(vec![line("Cable", "m", Decimal::ONE, Decimal::ONE, 23)], Decimal::ZERO))
        .await
        .expect("create");

    let error = quotes.update_status(&quote.id, "cancelled").await.expect_err("unknown status");
    assert!(matches!(
        error,
        ApplicationError::Domain(DomainError::Validation(ValidationError::UnknownStatus(_)))
    ));
    assert_eq!(quotes.find(&quote.id).await.expect("find").status, QuoteStatus::Draft);

    let skip = quotes.update_status(&quote.id, "accepted").await.expect_err("draft -> accepted");
    assert!(matches!(skip, ApplicationError::Domain(DomainError::InvalidQuoteTransition { .. })));

    quotes.update_status(&quote.id, "sent").await.expect("draft -> sent");
    let accepted = quotes.update_status(&quote.id, "Accepted").await.expect("sent -> accepted");
    assert_eq!(accepted.status, QuoteStatus::Accepted);
    assert_eq!(quotes.find(&quote.id).await.expect("find").status, QuoteStatus::Accepted);

    let reopen = quotes.update_status(&quote.id, "draft").await.expect_err("terminal");
    assert!(matches!(reopen, ApplicationError::Domain(DomainError::InvalidQuoteTransition { .. })));
}
for_both_stores!(status_lifecycle_and_unknown_status);

async fn concurrent_terminal_transitions_have_one_winner<S: PricingStore>(store: Arc<S>) {
    let quotes = QuoteService::new(Arc::clone(&store), MarginPolicy::default());
    let quote = quotes
        .create(&user(), new_quote(vec![line("Cable", "m", Decimal::ONE, Decimal::ONE, 23)], Decimal::ZERO))
        .await
        .expect("create");
    quotes.update_status(&quote.id, "sent").await.expect("draft -> sent");

    let (accepted, rejected) = tokio::join!(
        quotes.update_status(&quote.id, "accepted"),
        quotes.update_status(&quote.id, "rejected"),
    );
    assert_eq!(
        [accepted.is_ok(), rejected.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "accepted={accepted:?} rejected={rejected:?}"
    );
    let loser = accepted.as_ref().err().or(rejected.as_ref().err()).expect("one update loses");
    assert!(matches!(loser, ApplicationError::Domain(DomainError::InvalidQuoteTransition { .. })));

    let winner = accepted.or(rejected).expect("one update wins");
    let stored = quotes.find(&quote.id).await.expect("find");
    assert_eq!(stored.status, winner.status);

    let stale = store
        .update_status(&quote.id, QuoteStatus::Sent, QuoteStatus::Rejected, Utc::now())
        .await
        .expect("conditional write");
    assert!(!stale);
    assert_eq!(quotes.find(&quote.id).await.expect("find").status, winner.status);
}
for_both_stores!(concurrent_terminal_transitions_have_one_winner);

async fn delete_removes_quote_and_lines<S: PricingStore>(store: Arc<S>) {
    let quotes = QuoteService::new(store, MarginPolicy::default());
    let quote = quotes
        .create(&user(), new_quote(vec![line("Cable", "m", Decimal::ONE, Decimal::ONE, 23)], Decimal::ZERO))
        .await
        .expect("create");

    quotes.delete(&quote.id).await.expect("delete");
    assert!(matches!(
        quotes.find(&quote.id).await,
        Err(ApplicationError::NotFound { entity: "quote", .. })
    ));
    assert!(matches!(
        quotes.delete(&quote.id).await,
        Err(ApplicationError::NotFound { entity: "quote", .. })
    ));
}
for_both_stores!(delete_removes_quote_and_lines);

/// Duplicate positions fail on the second line insert, after the header, the
/// product and the first history row were written.
async fn failed_save_leaves_nothing_behind<S: PricingStore>(store: Arc<S>) {
    let now = Utc::now();
    let amounts = compute_line(Decimal::ONE, Decimal::from(10), Decimal::from(23));
    let frozen = |name: &str| QuoteLine {
        position: 0,
        product_name: name.to_string(),
        unit: "pcs".to_string(),
        quantity: Decimal::ONE,
        unit_price: Decimal::from(10),
        vat_rate: Decimal::from(23),
        amounts,
        cost_price: None,
        margin_percent: None,
        discount_percent: None,
        original_price: None,
    };
    let quote = Quote {
        id: QuoteId("Q-BROKEN".to_string()),
        owner: user(),
        client_id: None,
        client: ClientSnapshot { name: "Acme".to_string(), email: None, phone: None },
        delivery_days: 7,
        valid_days: 30,
        additional_costs: Decimal::ZERO,
        additional_costs_description: None,
        status: QuoteStatus::Draft,
        totals: QuoteTotals::default(),
        lines: vec![frozen("Rollback widget"), frozen("Second widget")],
        created_at: now,
        updated_at: now,
    };

    let error = store.save_quote(&quote).await.expect_err("duplicate position");
    assert!(matches!(error, StoreError::Consistency(_)));

    assert!(store.find_quote(&quote.id).await.expect("find").is_none());
    assert!(store
        .find_product_by_identity("Rollback widget", "pcs")
        .await
        .expect("lookup")
        .is_none());
}
for_both_stores!(failed_save_leaves_nothing_behind);

async fn margin_report_uses_frozen_costs<S: PricingStore>(store: Arc<S>) {
    let quotes = QuoteService::new(store, MarginPolicy::default());

    let mut costed = line("Steel beam", "m", Decimal::from(2), Decimal::from(125), 23);
    costed.cost_price = Some(Decimal::from(100));
    let mut thin = line("Bolt", "pcs", Decimal::from(10), dec(105, 2), 23);
    thin.cost_price = Some(Decimal::ONE);
    let uncosted = line("Transport handling", "h", Decimal::ONE, Decimal::from(40), 23);

    let quote = quotes
        .create(&user(), new_quote(vec![costed, thin, uncosted], Decimal::from(20)))
        .await
        .expect("create");

    let report = quotes.margin_report(&quote.id).await.expect("report");
    assert_eq!(report.lines_without_cost, 1);
    assert_eq!(report.lines_below_floor, 1);
    assert_eq!(report.cost_total, Decimal::from(210));
    assert_eq!(report.net_total, dec(26050, 2));
    assert_eq!(report.profit, dec(5050, 2));
    assert_eq!(report.lines[0].realized_margin, Some(Decimal::from(25)));
    assert_eq!(report.lines[1].realized_margin, Some(Decimal::from(5)));
}
for_both_stores!(margin_report_uses_frozen_costs);
