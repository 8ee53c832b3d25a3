use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

use venue_booking::clock::FixedClock;
use venue_booking::engine::{BookingWizard, DayStatus, WizardError, WizardStep};
use venue_booking::error::{BookingError, Violation};
use venue_booking::models::{BookingDraft, PricingUnit, ReservationStatus, Service, Venue};
use venue_booking::services::BookingCommitService;
use venue_booking::store::{InMemoryReservationStore, ReservationStore};

fn t(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, day).unwrap()
}

fn venue() -> Venue {
    Venue {
        id: 5,
        name: "Loft".to_string(),
        capacity: 120,
        base_price_per_hour: dec!(100),
        minimum_hours: 2,
        cleaning_fee: dec!(0),
        security_deposit: dec!(0),
        tax_rate: dec!(0.10),
        opening_time: t(8),
        closing_time: t(23),
        services: vec![
            Service {
                id: 1,
                name: "Catering".to_string(),
                unit_price: dec!(10),
                pricing_unit: PricingUnit::PerPerson,
            },
            Service {
                id: 2,
                name: "AV kit".to_string(),
                unit_price: dec!(50),
                pricing_unit: PricingUnit::FlatRate,
            },
        ],
    }
}

fn setup() -> (Arc<InMemoryReservationStore>, BookingCommitService) {
    let store = Arc::new(InMemoryReservationStore::new());
    store.add_venue(venue());
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()));
    let service = BookingCommitService::new(store.clone(), clock, Duration::minutes(15));
    (store, service)
}

async fn open_wizard(
    store: &InMemoryReservationStore,
    service: &BookingCommitService,
) -> BookingWizard {
    let venue = store.venue(5).await.unwrap();
    let clock = service.clock();
    let calendar = store
        .occupancy(5, d(1), d(31))
        .await
        .unwrap()
        .active_at(clock.now())
        .calendar(&venue, d(1), d(31), clock.today());
    BookingWizard::new(venue, calendar, clock.now().naive_utc())
}

fn fill(wizard: &mut BookingWizard, date: NaiveDate, start: u32, end: u32, guests: u32) {
    wizard.select_date(date).unwrap();
    wizard.set_time_window(t(start), t(end)).unwrap();
    wizard.set_guest_count(guests).unwrap();
}

#[tokio::test]
async fn full_flow_commits_the_reviewed_draft() {
    let (store, service) = setup();
    let mut wizard = open_wizard(&store, &service).await;
    assert_eq!(wizard.calendar().count(), 31);
    assert_eq!(wizard.day(d(10)).status, DayStatus::Available);

    fill(&mut wizard, d(10), 18, 21, 40);
    assert_eq!(wizard.next().unwrap(), WizardStep::Services);
    wizard.toggle_service(1).unwrap();
    wizard.toggle_service(2).unwrap();
    assert!(!wizard.toggle_service(2).unwrap());
    wizard.set_special_requests("late load-in").unwrap();
    assert_eq!(wizard.next().unwrap(), WizardStep::Review);

    // 3h * 100 + 40 * 10 = 700, plus 10% tax
    let quoted = *wizard.review_pricing().unwrap();
    assert_eq!(quoted.total, dec!(770));

    let reservation = wizard.commit(&service).await.unwrap();
    assert_eq!(wizard.step(), WizardStep::Committed);
    assert_eq!(wizard.reservation(), Some(&reservation));
    assert!(wizard.draft().is_none());
    assert_eq!(reservation.total_price, quoted.total);
    assert_eq!(reservation.service_ids, vec![1]);
    assert_eq!(reservation.special_requests.as_deref(), Some("late load-in"));
    assert_eq!(reservation.status, ReservationStatus::Pending);

    assert!(matches!(
        wizard.commit(&service).await,
        Err(WizardError::IllegalTransition {
            step: WizardStep::Committed,
            ..
        })
    ));
}

#[tokio::test]
async fn losing_the_race_returns_to_date_time_with_fresh_day() {
    let (store, service) = setup();
    let mut wizard = open_wizard(&store, &service).await;
    fill(&mut wizard, d(12), 10, 14, 20);
    wizard.next().unwrap();
    wizard.next().unwrap();

    // another session takes an overlapping slot while this one sits on review
    let mut rival = BookingDraft::new(5);
    rival.date = Some(d(12));
    rival.start_time = Some(t(12));
    rival.end_time = Some(t(16));
    rival.guest_count = Some(10);
    service.reserve(&rival).await.unwrap().into_result().unwrap();

    let Err(WizardError::Conflict(detail)) = wizard.commit(&service).await else {
        panic!("expected a conflict");
    };
    assert_eq!(detail.requested.start, t(10));
    assert_eq!(wizard.step(), WizardStep::DateTime);
    assert_eq!(wizard.day(d(12)).status, DayStatus::PartiallyBooked);
    assert_eq!(wizard.draft().unwrap().guest_count, Some(20));
    assert!(matches!(
        wizard.date_time_violations().as_slice(),
        [Violation::SlotTaken { .. }]
    ));

    // a free gap from the refreshed day goes through
    wizard.set_time_window(t(16), t(19)).unwrap();
    wizard.next().unwrap();
    wizard.next().unwrap();
    let reservation = wizard.commit(&service).await.unwrap();
    assert_eq!((reservation.start_time, reservation.end_time), (t(16), t(19)));
    assert_eq!(store.all_reservations(5).len(), 2);
}

#[tokio::test]
async fn date_blocked_after_loading_is_caught_at_commit() {
    let (store, service) = setup();
    let mut wizard = open_wizard(&store, &service).await;
    fill(&mut wizard, d(20), 9, 11, 10);
    wizard.next().unwrap();
    wizard.next().unwrap();

    store.add_block(venue_booking::models::Block {
        id: 9,
        venue_id: 5,
        start_date: d(20),
        end_date: d(20),
        reason: "private event".to_string(),
    });

    let Err(WizardError::Conflict(detail)) = wizard.commit(&service).await else {
        panic!("expected a conflict");
    };
    assert_eq!(detail.day.status, DayStatus::Blocked);
    assert_eq!(wizard.day(d(20)).status, DayStatus::Blocked);
    assert!(store.all_reservations(5).is_empty());
}

#[tokio::test]
async fn upstream_failure_keeps_the_review_step() {
    let (store, service) = setup();
    let mut wizard = open_wizard(&store, &service).await;
    fill(&mut wizard, d(15), 9, 11, 10);
    wizard.next().unwrap();
    wizard.next().unwrap();

    store.set_offline(true);
    assert!(matches!(
        wizard.commit(&service).await,
        Err(WizardError::Commit(BookingError::UpstreamUnavailable(_)))
    ));
    assert_eq!(wizard.step(), WizardStep::Review);

    store.set_offline(false);
    wizard.commit(&service).await.unwrap();
    assert_eq!(wizard.step(), WizardStep::Committed);
}
