use railbook_core::Seat;
use serde::Deserialize;
use uuid::Uuid;

const COLUMNS: [char; 4] = ['A', 'B', 'C', 'D'];
const DEFAULT_CAPACITY: u32 = 64;

/// One carriage of a train, described at schedule-setup time.
#[derive(Debug, Clone, Deserialize)]
pub struct CarriageLayout {
    pub name: String,
    /// Number of seats; filled row by row across columns A-D.
    pub capacity: u32,
}

/// Generate the seat rows for a schedule from its carriage layouts.
/// Codes run `1A, 1B, 1C, 1D, 2A, ...` per carriage.
pub fn generate_seats(schedule_id: Uuid, carriages: &[CarriageLayout]) -> Vec<Seat> {
    let mut seats = Vec::new();
    for carriage in carriages {
        let capacity = if carriage.capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            carriage.capacity
        };
        let mut issued = 0;
        let mut row = 1u32;
        'rows: loop {
            for col in COLUMNS {
                if issued == capacity {
                    break 'rows;
                }
                seats.push(Seat::new(
                    schedule_id,
                    carriage.name.clone(),
                    format!("{}{}", row, col),
                ));
                issued += 1;
            }
            row += 1;
        }
    }
    seats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_run_row_by_row_across_columns() {
        let seats = generate_seats(
            Uuid::new_v4(),
            &[CarriageLayout {
                name: "EKS-1".to_string(),
                capacity: 6,
            }],
        );
        let codes: Vec<&str> = seats.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["1A", "1B", "1C", "1D", "2A", "2B"]);
        assert!(seats.iter().all(|s| s.carriage == "EKS-1"));
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let seats = generate_seats(
            Uuid::new_v4(),
            &[CarriageLayout {
                name: "EKO-1".to_string(),
                capacity: 0,
            }],
        );
        assert_eq!(seats.len(), 64);
    }

    #[test]
    fn multiple_carriages_keep_independent_numbering() {
        let seats = generate_seats(
            Uuid::new_v4(),
            &[
                CarriageLayout {
                    name: "A".to_string(),
                    capacity: 4,
                },
                CarriageLayout {
                    name: "B".to_string(),
                    capacity: 4,
                },
            ],
        );
        assert_eq!(seats.len(), 8);
        assert_eq!(seats[4].carriage, "B");
        assert_eq!(seats[4].code, "1A");
    }
}
