use turnstile_shared::{Event, Seat};

const SECTIONS: [(&str, i32); 5] = [("A", 299), ("B", 199), ("C", 149), ("D", 99), ("E", 79)];
const ROWS_PER_SECTION: u32 = 8;
const SEATS_PER_ROW: u32 = 5;

pub fn demo_events() -> Vec<Event> {
    vec![
        Event {
            id: "f1-gp-2025".to_string(),
            name: "F1 Grand Prix - Sunday".to_string(),
            date: "Nov 23, 2025 3:00 PM".to_string(),
            venue: "Las Vegas Street Circuit".to_string(),
            image_url: Some("/f1.jpg".to_string()),
            status: "active".to_string(),
        },
        Event {
            id: "qualifying-2025".to_string(),
            name: "F1 Qualifying - Las Vegas 2025".to_string(),
            date: "Nov 21, 2025 10:00 AM".to_string(),
            venue: "Las Vegas Street Circuit".to_string(),
            image_url: Some("/f1-lights.jpg".to_string()),
            status: "active".to_string(),
        },
    ]
}

/// 200 seats: sections A to E, 8 rows of 5. Every 20th seat is accessible.
pub fn demo_seats() -> Vec<Seat> {
    let mut seats = Vec::new();
    for (section, price) in SECTIONS {
        for row in 1..=ROWS_PER_SECTION {
            for number in 1..=SEATS_PER_ROW {
                let ordinal = seats.len() + 1;
                seats.push(Seat {
                    id: format!("{section}{row}-{number}"),
                    section: section.to_string(),
                    row: row.to_string(),
                    number: number.to_string(),
                    price,
                    is_accessible: ordinal % 20 == 0,
                });
            }
        }
    }
    seats
}
