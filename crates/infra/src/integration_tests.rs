//! End-to-end lifecycle tests over the in-memory store: browse, reserve,
//! expire, checkout.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use tienda_catalog::{Category, PriceSort, Product, ProductFilter, Size};
use tienda_core::{DomainError, Money, StockUnitId, UserId};
use tienda_inventory::StockUnit;
use tienda_orders::OrderStatus;

use crate::store::{InMemoryStore, Store, StoreError};
use crate::{CatalogBrowse, Checkout, ReservationManager};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

fn domain(err: &StoreError) -> &DomainError {
    err.as_domain().expect("expected a domain error")
}

struct Fixture {
    store: Arc<InMemoryStore>,
    manager: ReservationManager<Arc<InMemoryStore>>,
    user: UserId,
    tee: Product,
    /// Size M of the tee, seeded with 3 in stock at 10.00 each.
    tee_m: StockUnitId,
    cap: Product,
    /// One-size cap, seeded with 5 in stock at 5.00 each.
    cap_u: StockUnitId,
}

async fn fixture() -> Fixture {
    tienda_observability::tracing::init_for_tests();

    let store = Arc::new(InMemoryStore::new());
    let now = t0();

    let remeras = Category::new("Remeras", "remeras").unwrap();
    let accesorios = Category::new("Accesorios", "accesorios").unwrap();
    let size_m = Size::new("M").unwrap();
    let size_u = Size::new("U").unwrap();

    let tee = Product::new(
        remeras.id,
        "Basic Tee",
        "basic-tee",
        Money::from_parts(10, 0),
        now,
    )
    .unwrap();
    let cap = Product::new(
        accesorios.id,
        "Logo Cap",
        "logo-cap",
        Money::from_parts(5, 0),
        now,
    )
    .unwrap();

    let tee_m = StockUnit::new(tee.id, size_m.id, 3);
    let cap_u = StockUnit::new(cap.id, size_u.id, 5);
    let tee_m_id = tee_m.id;
    let cap_u_id = cap_u.id;

    store.put_category(remeras).await.unwrap();
    store.put_category(accesorios).await.unwrap();
    store.put_size(size_m).await.unwrap();
    store.put_size(size_u).await.unwrap();
    store.put_product(tee.clone()).await.unwrap();
    store.put_product(cap.clone()).await.unwrap();
    store.put_stock_unit(tee_m).await.unwrap();
    store.put_stock_unit(cap_u).await.unwrap();

    Fixture {
        manager: ReservationManager::new(Arc::clone(&store)),
        store,
        user: UserId::new(),
        tee,
        tee_m: tee_m_id,
        cap,
        cap_u: cap_u_id,
    }
}

async fn available(store: &Arc<InMemoryStore>, id: StockUnitId) -> u32 {
    store.stock_unit(id).await.unwrap().unwrap().available
}

#[tokio::test]
async fn add_debits_stock_and_prices_the_cart_live() {
    let fx = fixture().await;
    let now = t0();

    fx.manager
        .add(Some(fx.user), Some(fx.tee_m), 2, now)
        .await
        .unwrap();
    assert_eq!(available(&fx.store, fx.tee_m).await, 1);

    let snapshot = fx.manager.cart_snapshot(Some(fx.user), now).await.unwrap();
    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(snapshot.lines[0].line_total, Money::from_parts(20, 0));
    assert_eq!(snapshot.total, Money::from_parts(20, 0));
    assert_eq!(
        snapshot.expires_at,
        Some(now + fx.manager.hold()),
        "countdown runs from the oldest reservation"
    );
}

#[tokio::test]
async fn add_rejects_overdraw_without_touching_stock() {
    let fx = fixture().await;
    let err = fx
        .manager
        .add(Some(fx.user), Some(fx.tee_m), 4, t0())
        .await
        .unwrap_err();
    assert!(matches!(
        domain(&err),
        DomainError::InsufficientStock {
            requested: 4,
            available: 3
        }
    ));
    assert_eq!(available(&fx.store, fx.tee_m).await, 3);

    let snapshot = fx.manager.cart_snapshot(Some(fx.user), t0()).await.unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn add_requires_a_signed_in_user() {
    let fx = fixture().await;
    let err = fx
        .manager
        .add(None, Some(fx.tee_m), 1, t0())
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), DomainError::Unauthenticated));

    let err = fx.manager.cart_snapshot(None, t0()).await.unwrap_err();
    assert!(matches!(domain(&err), DomainError::Unauthenticated));
}

#[tokio::test]
async fn add_requires_a_size_selection() {
    let fx = fixture().await;
    let err = fx.manager.add(Some(fx.user), None, 1, t0()).await.unwrap_err();
    assert!(matches!(domain(&err), DomainError::InvalidSelection));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_never_oversell() {
    let fx = fixture().await;
    let now = t0();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = fx.manager.clone();
        let tee_m = fx.tee_m;
        handles.push(tokio::spawn(async move {
            manager.add(Some(UserId::new()), Some(tee_m), 1, now).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert!(matches!(
                domain(&err),
                DomainError::InsufficientStock { .. }
            )),
        }
    }

    assert_eq!(successes, 3, "exactly the seeded stock is sold");
    assert_eq!(available(&fx.store, fx.tee_m).await, 0);
}

#[tokio::test]
async fn expired_reservations_return_their_stock() {
    let fx = fixture().await;
    let now = t0();

    fx.manager
        .add(Some(fx.user), Some(fx.tee_m), 2, now)
        .await
        .unwrap();
    assert_eq!(available(&fx.store, fx.tee_m).await, 1);

    let later = now + fx.manager.hold() + Duration::seconds(1);
    assert_eq!(fx.manager.sweep_expired(later).await.unwrap(), 1);
    assert_eq!(available(&fx.store, fx.tee_m).await, 3);

    let snapshot = fx
        .manager
        .cart_snapshot(Some(fx.user), later)
        .await
        .unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.expires_at, None);

    // Nothing left for a second sweep.
    assert_eq!(fx.manager.sweep_expired(later).await.unwrap(), 0);
}

#[tokio::test]
async fn reservation_survives_to_the_exact_hold_boundary() {
    let fx = fixture().await;
    let now = t0();

    fx.manager
        .add(Some(fx.user), Some(fx.tee_m), 1, now)
        .await
        .unwrap();

    // Exactly hold-duration old: still live.
    let boundary = now + fx.manager.hold();
    assert_eq!(fx.manager.sweep_expired(boundary).await.unwrap(), 0);
    let snapshot = fx
        .manager
        .cart_snapshot(Some(fx.user), boundary)
        .await
        .unwrap();
    assert_eq!(snapshot.lines.len(), 1);

    // One second past: gone.
    assert_eq!(
        fx.manager
            .sweep_expired(boundary + Duration::seconds(1))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn sweep_releases_hold_when_stock_unit_was_deleted() {
    let fx = fixture().await;
    let now = t0();

    fx.manager
        .add(Some(fx.user), Some(fx.tee_m), 1, now)
        .await
        .unwrap();
    assert!(fx.store.remove_stock_unit(fx.tee_m).await.unwrap());

    let later = now + fx.manager.hold() + Duration::seconds(1);
    assert_eq!(fx.manager.sweep_expired(later).await.unwrap(), 1);
}

#[tokio::test]
async fn checkout_captures_prices_and_clears_the_cart() {
    let fx = fixture().await;
    let now = t0();
    let checkout = Checkout::new(fx.manager.clone(), "pagos.tienda");

    fx.manager
        .add(Some(fx.user), Some(fx.tee_m), 2, now)
        .await
        .unwrap();
    fx.manager
        .add(Some(fx.user), Some(fx.cap_u), 1, now)
        .await
        .unwrap();

    let receipt = checkout.checkout(Some(fx.user), now).await.unwrap();
    assert_eq!(receipt.payment_alias, "pagos.tienda");
    assert_eq!(receipt.order.total, Money::from_parts(25, 0));
    assert_eq!(receipt.order.status, OrderStatus::PendingTransfer);
    assert_eq!(receipt.order.lines.len(), 2);

    // The cart is empty but the cart row itself survives.
    let snapshot = fx.manager.cart_snapshot(Some(fx.user), now).await.unwrap();
    assert!(snapshot.is_empty());
    assert!(fx.store.cart_for_user(fx.user).await.unwrap().is_some());

    // Stock stays debited; checkout moves nothing back.
    assert_eq!(available(&fx.store, fx.tee_m).await, 1);

    // A later price change does not rewrite the order.
    let mut tee = fx.tee.clone();
    tee.price = Money::from_parts(99, 0);
    fx.store.put_product(tee).await.unwrap();
    let stored = fx
        .store
        .order(receipt.order.id)
        .await
        .unwrap()
        .expect("order persisted");
    assert_eq!(stored.total, Money::from_parts(25, 0));
    assert_eq!(stored.lines[0].unit_price, Money::from_parts(10, 0));
}

#[tokio::test]
async fn checkout_rejects_an_empty_cart() {
    let fx = fixture().await;
    let checkout = Checkout::new(fx.manager.clone(), "pagos.tienda");

    // No cart at all.
    let err = checkout.checkout(Some(fx.user), t0()).await.unwrap_err();
    assert!(matches!(domain(&err), DomainError::EmptyCart));

    // A cart whose only reservation has expired counts as empty too.
    let now = t0();
    fx.manager
        .add(Some(fx.user), Some(fx.tee_m), 1, now)
        .await
        .unwrap();
    let later = now + fx.manager.hold() + Duration::seconds(1);
    let err = checkout.checkout(Some(fx.user), later).await.unwrap_err();
    assert!(matches!(domain(&err), DomainError::EmptyCart));
    assert_eq!(available(&fx.store, fx.tee_m).await, 3);
}

#[tokio::test]
async fn checkout_keeps_only_live_reservations() {
    let fx = fixture().await;
    let checkout = Checkout::new(fx.manager.clone(), "pagos.tienda");

    let now = t0();
    fx.manager
        .add(Some(fx.user), Some(fx.tee_m), 1, now)
        .await
        .unwrap();

    // Revisit past the hold and grab a cap; the tee hold lapses on the way.
    let later = now + fx.manager.hold() + Duration::minutes(1);
    fx.manager
        .add(Some(fx.user), Some(fx.cap_u), 1, later)
        .await
        .unwrap();

    let receipt = checkout.checkout(Some(fx.user), later).await.unwrap();
    assert_eq!(receipt.order.lines.len(), 1);
    assert_eq!(receipt.order.lines[0].product_id, fx.cap.id);
    assert_eq!(receipt.order.total, Money::from_parts(5, 0));
}

#[tokio::test]
async fn order_status_moves_forward_only() {
    let fx = fixture().await;
    let checkout = Checkout::new(fx.manager.clone(), "pagos.tienda");
    let now = t0();

    fx.manager
        .add(Some(fx.user), Some(fx.cap_u), 1, now)
        .await
        .unwrap();
    let receipt = checkout.checkout(Some(fx.user), now).await.unwrap();

    fx.store
        .update_order_status(receipt.order.id, OrderStatus::Confirmed, now)
        .await
        .unwrap();
    let stored = fx.store.order(receipt.order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);

    let err = fx
        .store
        .update_order_status(receipt.order.id, OrderStatus::Cancelled, now)
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), DomainError::Validation(_)));
}

#[tokio::test]
async fn browse_lists_filters_and_sorts() {
    let fx = fixture().await;
    let browse = CatalogBrowse::new(Arc::clone(&fx.store));

    let all = browse
        .products(&ProductFilter::all().sorted(PriceSort::PriceAsc))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].slug, "logo-cap");

    let remeras = browse
        .products(&ProductFilter::in_category("remeras"))
        .await
        .unwrap();
    assert_eq!(remeras.len(), 1);
    assert_eq!(remeras[0].slug, "basic-tee");

    let none = browse
        .products(&ProductFilter::in_category("zapatos"))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn browse_hides_inactive_products() {
    let fx = fixture().await;
    let browse = CatalogBrowse::new(Arc::clone(&fx.store));

    let mut tee = fx.tee.clone();
    tee.is_active = false;
    fx.store.put_product(tee).await.unwrap();

    let all = browse.products(&ProductFilter::all()).await.unwrap();
    assert_eq!(all.len(), 1);

    let err = browse.product_by_slug("basic-tee").await.unwrap_err();
    assert!(matches!(domain(&err), DomainError::NotFound));
}

#[tokio::test]
async fn size_options_include_sold_out_sizes() {
    let fx = fixture().await;
    let browse = CatalogBrowse::new(Arc::clone(&fx.store));

    fx.manager
        .add(Some(fx.user), Some(fx.cap_u), 5, t0())
        .await
        .unwrap();

    let options = browse.size_options("logo-cap").await.unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].size.name, "U");
    assert_eq!(options[0].unit.available, 0);
}
