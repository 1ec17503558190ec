//! Polish alphabetical ordering of addresses
//!
//! Used as the visiting order when no optimized route is available. Letters
//! follow the Polish alphabet (`ą` after `a`, `ł` after `l`, ...). Case is
//! ignored. Whitespace sorts before punctuation, punctuation before digits and
//! digits before letters.

use std::cmp::Ordering;

use crate::types::Order;

const POLISH_ALPHABET: [char; 35] = [
    'a', 'ą', 'b', 'c', 'ć', 'd', 'e', 'ę', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'ł', 'm', 'n', 'ń',
    'o', 'ó', 'p', 'q', 'r', 's', 'ś', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ź', 'ż',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CharClass {
    Whitespace,
    Punctuation,
    Digit,
    Letter,
}

fn char_key(c: char) -> (CharClass, u32) {
    if c.is_whitespace() {
        return (CharClass::Whitespace, 0);
    }
    if c.is_ascii_digit() {
        return (CharClass::Digit, u32::from(c));
    }
    if c.is_alphabetic() {
        let lower = c.to_lowercase().next().unwrap_or(c);
        let rank = match POLISH_ALPHABET.iter().position(|&l| l == lower) {
            Some(i) => i as u32,
            // Letters outside the alphabet go after 'ż', by code point.
            None => POLISH_ALPHABET.len() as u32 + u32::from(lower),
        };
        return (CharClass::Letter, rank);
    }
    (CharClass::Punctuation, u32::from(c))
}

/// Compare two addresses in Polish alphabetical order, ignoring case
pub fn compare_addresses(a: &str, b: &str) -> Ordering {
    a.trim().chars().map(char_key).cmp(b.trim().chars().map(char_key))
}

/// Fallback visiting order: by address, ties broken by id
pub fn by_address(a: &Order, b: &Order) -> Ordering {
    compare_addresses(&a.address, &b.address).then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceType;
    use chrono::Utc;

    fn order(id: i32, address: &str) -> Order {
        Order {
            id,
            client_name: format!("Klient {}", id),
            phone_number: "500600700".to_string(),
            address: address.to_string(),
            description: None,
            service_type: ServiceType::Transport,
            time_range: None,
            completed: false,
            completed_at: None,
            photo_urls: vec![],
            created_at: Utc::now(),
            coords: None,
        }
    }

    fn sorted(addresses: &[&str]) -> Vec<String> {
        let mut v: Vec<&str> = addresses.to_vec();
        v.sort_by(|a, b| compare_addresses(a, b));
        v.into_iter().map(String::from).collect()
    }

    #[test]
    fn polish_letters_follow_their_base() {
        assert_eq!(sorted(&["Łąkowa", "Lipowa", "Mazowiecka"]), vec!["Lipowa", "Łąkowa", "Mazowiecka"]);
        assert_eq!(sorted(&["Źródlana", "Żytnia", "Zielona"]), vec!["Zielona", "Źródlana", "Żytnia"]);
        assert_eq!(sorted(&["Ściegiennego", "Sokołowska", "Tylna"]), vec!["Sokołowska", "Ściegiennego", "Tylna"]);
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(compare_addresses("sokołowska 1", "SOKOŁOWSKA 1"), Ordering::Equal);
        assert_eq!(sorted(&["bema", "Armii"]), vec!["Armii", "bema"]);
    }

    #[test]
    fn digits_before_letters_and_shorter_prefix_first() {
        assert_eq!(sorted(&["Aleja", "3 Maja"]), vec!["3 Maja", "Aleja"]);
        assert_eq!(sorted(&["Kilińskiego 12", "Kilińskiego 1"]), vec!["Kilińskiego 1", "Kilińskiego 12"]);
    }

    #[test]
    fn whitespace_before_punctuation() {
        assert_eq!(compare_addresses("Al. Jana", "Al Jana"), Ordering::Greater);
    }

    #[test]
    fn ties_go_to_lower_id() {
        let mut orders = vec![
            order(7, "Piłsudskiego 4"),
            order(2, "Bema 1"),
            order(3, "piłsudskiego 4"),
        ];
        orders.sort_by(by_address);
        let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 3, 7]);
    }

    #[test]
    fn acute_letters_sit_between_neighbours() {
        assert_eq!(compare_addresses("Ćwiklińskiej", "Czarnieckiego"), Ordering::Greater);
        assert_eq!(compare_addresses("Ćwiklińskiej", "Dąbrowskiego"), Ordering::Less);
    }
}
