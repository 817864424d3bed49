use std::cmp::Ordering;

use crate::model::*;

// ── Availability Index ────────────────────────────────────────────

/// Every (cage, window) pair able to host `pet` for the whole of `stay`.
///
/// A cage qualifies when its capacity is at least the pet's minimum and, for
/// a dangerous pet, its policy allows one. Of a qualifying cage, each open
/// window that contains the stay (bounds inclusive) yields one candidate, so
/// a cage can appear more than once. Output is ordered by [`order_candidates`].
pub fn candidates(cages: &[CageState], stay: &Span, pet: &Pet) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = cages
        .iter()
        .filter(|cage| cage.fits(pet))
        .flat_map(|cage| {
            let info = cage.info();
            cage.windows
                .iter()
                .filter(move |w| w.can_host(stay))
                .map(move |w| Candidate {
                    cage: info.clone(),
                    window: w.clone(),
                })
        })
        .collect();
    order_candidates(&mut out);
    out
}

/// Cheapest first, then roomiest first. Remaining ties fall back to cage id,
/// and windows of one cage keep their stored order (the sort is stable).
pub fn order_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| compare_cages(&a.cage, &b.cage));
}

fn compare_cages(a: &CageInfo, b: &CageInfo) -> Ordering {
    a.price
        .total_cmp(&b.price)
        .then_with(|| b.square_meters.total_cmp(&a.square_meters))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn day(y: i32, m: u32, d: u32) -> Ms {
        date_ms(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn make_cage(square_meters: f64, allows_dangerous: bool, price: f64, windows: Vec<Window>) -> CageState {
        let mut cage = CageState::new(
            Ulid::new(),
            Ulid::new(),
            NewCage {
                name: format!("{square_meters}m2 @ {price}"),
                square_meters,
                is_carpeted: false,
                has_toys: true,
                allows_dangerous,
                price,
            },
        );
        for w in windows {
            cage.push_window(w);
        }
        cage
    }

    fn open(start: Ms, end: Ms) -> Window {
        Window::open(Ulid::new(), Span::new(start, end))
    }

    fn claimed(start: Ms, end: Ms) -> Window {
        Window {
            id: Ulid::new(),
            span: Span::new(start, end),
            claim: Some(Claim {
                guest_owner_id: Ulid::new(),
                guest_pet_id: Ulid::new(),
                booked_at: 0,
            }),
        }
    }

    fn pet(size: f64, is_dangerous: bool) -> Pet {
        Pet {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            name: "Kaa".into(),
            species: "python".into(),
            size,
            is_dangerous,
        }
    }

    fn june() -> Window {
        open(day(2024, 6, 1), day(2024, 6, 10))
    }

    #[test]
    fn single_open_window_matches() {
        let cage = make_cage(20.0, false, 15.0, vec![june()]);
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        let found = candidates(std::slice::from_ref(&cage), &stay, &pet(40.0, false));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cage.id, cage.id);
        assert_eq!(found[0].window, cage.windows[0]);
    }

    #[test]
    fn dangerous_pet_never_matches_safe_cage() {
        let cage = make_cage(20.0, false, 15.0, vec![june()]);
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        assert!(candidates(&[cage], &stay, &pet(40.0, true)).is_empty());
    }

    #[test]
    fn dangerous_pet_matches_permissive_cage() {
        let cage = make_cage(20.0, true, 15.0, vec![june()]);
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        assert_eq!(candidates(&[cage], &stay, &pet(40.0, true)).len(), 1);
    }

    #[test]
    fn stay_past_window_end_is_excluded() {
        let cage = make_cage(20.0, false, 15.0, vec![june()]);
        let stay = Span::new(day(2024, 6, 8), day(2024, 6, 12));
        assert!(candidates(std::slice::from_ref(&cage), &stay, &pet(40.0, false)).is_empty());

        let before = Span::new(day(2024, 5, 30), day(2024, 6, 3));
        assert!(candidates(&[cage], &before, &pet(40.0, false)).is_empty());
    }

    #[test]
    fn exact_boundaries_match() {
        let cage = make_cage(20.0, false, 15.0, vec![june()]);
        let stay = Span::new(day(2024, 6, 1), day(2024, 6, 10));
        assert_eq!(candidates(&[cage], &stay, &pet(40.0, false)).len(), 1);
    }

    #[test]
    fn capacity_below_minimum_is_excluded() {
        let small = make_cage(9.5, true, 1.0, vec![june()]);
        let exact = make_cage(10.0, true, 2.0, vec![june()]);
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        let found = candidates(&[small, exact.clone()], &stay, &pet(40.0, false));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cage.id, exact.id);
    }

    #[test]
    fn capacity_filter_holds_for_many_sizes() {
        let cages: Vec<CageState> = (1..=20)
            .map(|m| make_cage(m as f64, true, 10.0, vec![june()]))
            .collect();
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        for size in [0.5, 3.0, 4.0, 17.0, 40.0, 79.9, 80.0, 81.0, 200.0] {
            let p = pet(size, false);
            let found = candidates(&cages, &stay, &p);
            assert!(found.iter().all(|c| c.cage.square_meters >= size / 4.0));
            let expected = cages.iter().filter(|c| c.square_meters >= size / 4.0).count();
            assert_eq!(found.len(), expected, "size {size}");
        }
    }

    #[test]
    fn claimed_windows_are_skipped() {
        let cage = make_cage(
            20.0,
            false,
            15.0,
            vec![
                claimed(day(2024, 6, 1), day(2024, 6, 10)),
                open(day(2024, 6, 1), day(2024, 6, 30)),
            ],
        );
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        let found = candidates(std::slice::from_ref(&cage), &stay, &pet(40.0, false));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].window, cage.windows[1]);
    }

    #[test]
    fn one_candidate_per_qualifying_window() {
        let a = open(day(2024, 6, 1), day(2024, 6, 10));
        let b = open(day(2024, 5, 1), day(2024, 7, 1));
        let cage = make_cage(20.0, false, 15.0, vec![a.clone(), b.clone()]);
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        let found = candidates(&[cage], &stay, &pet(40.0, false));
        let windows: Vec<_> = found.into_iter().map(|c| c.window).collect();
        assert_eq!(windows, vec![a, b]);
    }

    #[test]
    fn ordered_by_price_then_larger_first() {
        let pricey = make_cage(50.0, false, 30.0, vec![june()]);
        let cheap_small = make_cage(12.0, false, 10.0, vec![june()]);
        let cheap_large = make_cage(25.0, false, 10.0, vec![june()]);
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        let found = candidates(
            &[pricey.clone(), cheap_small.clone(), cheap_large.clone()],
            &stay,
            &pet(40.0, false),
        );
        let ids: Vec<Ulid> = found.iter().map(|c| c.cage.id).collect();
        assert_eq!(ids, vec![cheap_large.id, cheap_small.id, pricey.id]);
    }

    #[test]
    fn order_does_not_depend_on_input_order() {
        let cages: Vec<CageState> = (0..6)
            .map(|i| make_cage(10.0 + (i % 2) as f64, false, (i / 2) as f64, vec![june()]))
            .collect();
        let stay = Span::new(day(2024, 6, 2), day(2024, 6, 5));
        let p = pet(4.0, false);

        let forward = candidates(&cages, &stay, &p);
        let mut reversed_input = cages.clone();
        reversed_input.reverse();
        let backward = candidates(&reversed_input, &stay, &p);
        assert_eq!(forward, backward);
    }

    #[test]
    fn containment_property_over_grid() {
        // Window [10, 20] against every stay [a, b) with 0 <= a < b <= 30.
        let w = open(10 * DAY_MS, 20 * DAY_MS);
        let cage = make_cage(20.0, false, 1.0, vec![w.clone()]);
        let p = pet(1.0, false);
        for a in 0..30 {
            for b in (a + 1)..=30 {
                let stay = Span::new(a * DAY_MS, b * DAY_MS);
                let hit = !candidates(std::slice::from_ref(&cage), &stay, &p).is_empty();
                let expected = w.span.start <= stay.start && w.span.end >= stay.end;
                assert_eq!(hit, expected, "stay [{a}, {b})");
            }
        }
    }

    #[test]
    fn no_cages_no_candidates() {
        let stay = Span::new(0, DAY_MS);
        assert!(candidates(&[], &stay, &pet(1.0, false)).is_empty());
    }
}
