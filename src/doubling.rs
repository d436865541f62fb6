use chrono::NaiveDate;

use crate::domain::{DailyCount, DoublingEntry};

/// For each entry of `counts` (ascending by date), the earliest present date
/// whose cumulative sum is at least twice the entry's own, or `None` when the
/// data runs out first.
///
/// Cumulative sums never decrease, so neither does the doubling target, and
/// the scan cursor is carried across entries instead of restarting at each
/// one. Linear in `counts.len()`.
pub fn doubling_dates(counts: &[DailyCount]) -> Vec<Option<NaiveDate>> {
    let mut result = Vec::with_capacity(counts.len());
    let mut cursor = 0;

    for (index, entry) in counts.iter().enumerate() {
        let target = entry.cumulative_sum.saturating_mul(2);
        cursor = cursor.max(index);
        while cursor < counts.len() && counts[cursor].cumulative_sum < target {
            cursor += 1;
        }
        result.push(counts.get(cursor).map(|found| found.date));
    }

    result
}

/// Doubling entries for every calendar day from the first date of `counts`.
///
/// Days missing from the sparse input inherit the entry computed for the
/// closest present date before them. Dates whose sum never doubles, and the
/// days filled from them, produce nothing.
pub fn compute(counts: &[DailyCount]) -> Vec<DoublingEntry> {
    let doubled = doubling_dates(counts);
    let mut series = Vec::new();

    for (index, (entry, doubling_date)) in counts.iter().zip(&doubled).enumerate() {
        let Some(doubling_date) = *doubling_date else {
            continue;
        };
        let days_until_doubling = (doubling_date - entry.date).num_days();
        let filled = DoublingEntry {
            date: entry.date,
            days_until_doubling,
            doubling_date,
        };
        series.push(filled);

        if let Some(next) = counts.get(index + 1) {
            let mut day = entry.date;
            while let Some(following) = day.succ_opt() {
                if following >= next.date {
                    break;
                }
                series.push(DoublingEntry {
                    date: following,
                    ..filled
                });
                day = following;
            }
        }
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::aggregate;
    use crate::testing::date;

    fn count(d: &str, count: u64, cumulative_sum: u64) -> DailyCount {
        DailyCount {
            date: date(d),
            count,
            cumulative_sum,
        }
    }

    #[test]
    fn doubling_dates_for_sparse_counts() {
        let counts = vec![
            count("2020-01-01", 5, 5),
            count("2020-01-03", 5, 10),
            count("2020-01-10", 10, 20),
        ];

        assert_eq!(
            doubling_dates(&counts),
            vec![Some(date("2020-01-03")), Some(date("2020-01-10")), None]
        );

        let series = compute(&counts);
        assert_eq!(
            series[0],
            DoublingEntry {
                date: date("2020-01-01"),
                days_until_doubling: 2,
                doubling_date: date("2020-01-03"),
            }
        );
        let jan3 = series.iter().find(|e| e.date == date("2020-01-03")).unwrap();
        assert_eq!(jan3.days_until_doubling, 7);
        assert_eq!(jan3.doubling_date, date("2020-01-10"));
        // Last date never doubles.
        assert!(series.iter().all(|e| e.date < date("2020-01-10")));
        // 01-01..=01-09, one entry per day.
        assert_eq!(series.len(), 9);
    }

    #[test]
    fn gap_days_inherit_the_previous_result() {
        let counts = vec![
            count("2020-01-01", 10, 10),
            count("2020-01-05", 15, 25),
            count("2020-01-06", 30, 55),
        ];

        let series = compute(&counts);

        let jan1 = series[0];
        assert_eq!(jan1.doubling_date, date("2020-01-05"));
        for day in ["2020-01-02", "2020-01-03", "2020-01-04"] {
            let entry = series.iter().find(|e| e.date == date(day)).unwrap();
            assert_eq!(entry.doubling_date, jan1.doubling_date);
            assert_eq!(entry.days_until_doubling, jan1.days_until_doubling);
        }
        let jan5 = series.iter().find(|e| e.date == date("2020-01-05")).unwrap();
        assert_eq!(jan5.doubling_date, date("2020-01-06"));
    }

    #[test]
    fn reported_doubling_is_the_earliest() {
        let mut dates = Vec::new();
        for day in 0..200i64 {
            let d = date("2000-01-01") + chrono::Duration::days(day * 2);
            for _ in 0..((day * 7) % 5 + 1) {
                dates.push(d);
            }
        }
        let counts = aggregate(&dates);
        let doubled = doubling_dates(&counts);

        for (i, found) in doubled.iter().enumerate() {
            let target = counts[i].cumulative_sum * 2;
            let naive = counts[i..]
                .iter()
                .find(|c| c.cumulative_sum >= target)
                .map(|c| c.date);
            assert_eq!(*found, naive);
        }
    }

    #[test]
    fn no_history_no_entries() {
        assert!(compute(&[]).is_empty());
        assert!(compute(&[count("2020-01-01", 3, 3)]).is_empty());
    }
}
