use crate::models::{ContactInfo, Gender, Passenger, PassengerType};
use crate::BookingError;
use chrono::{Datelike, NaiveDate};
use skybook_core::provider::PassengerPayload;

/// Age threshold below which a female passenger is titled "miss".
const MISS_AGE_THRESHOLD: i32 = 12;

/// Derive the salutation the provider expects. Titles are never trusted from
/// input; they are recomputed from gender and date of birth at booking time.
pub fn derive_title(gender: Gender, date_of_birth: NaiveDate, today: NaiveDate) -> &'static str {
    match gender {
        Gender::Male => "mr",
        Gender::Female => {
            if age_in_years(date_of_birth, today) < MISS_AGE_THRESHOLD {
                "miss"
            } else {
                "ms"
            }
        }
    }
}

pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Strip whitespace and hyphens; keep the number only if the result is a
/// plausible international length (10-17 chars, `+` prefix counted). An
/// invalid phone is omitted rather than forwarded.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let normalized: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if (10..=17).contains(&normalized.len()) {
        Some(normalized)
    } else {
        None
    }
}

/// Passenger composition rules: at least one adult, and at most one lap
/// infant per adult. Pure check, no side effects.
pub fn validate_composition(passengers: &[Passenger]) -> Result<(), BookingError> {
    let adults = passengers
        .iter()
        .filter(|p| p.passenger_type == PassengerType::Adult)
        .count();
    let infants = passengers
        .iter()
        .filter(|p| p.passenger_type == PassengerType::Infant)
        .count();

    if adults == 0 {
        return Err(BookingError::Validation(
            "At least one adult passenger is required".to_string(),
        ));
    }
    if infants > adults {
        return Err(BookingError::Validation(format!(
            "Each infant must be accompanied by an adult ({} infants, {} adults)",
            infants, adults
        )));
    }
    Ok(())
}

/// Positional pairing: the nth infant rides with the nth adult. Returns
/// (infant index, adult index) pairs over the original passenger slice.
/// Assumes `validate_composition` has already passed.
pub fn pair_infants(passengers: &[Passenger]) -> Vec<(usize, usize)> {
    let adult_indices: Vec<usize> = passengers
        .iter()
        .enumerate()
        .filter(|(_, p)| p.passenger_type == PassengerType::Adult)
        .map(|(i, _)| i)
        .collect();
    passengers
        .iter()
        .enumerate()
        .filter(|(_, p)| p.passenger_type == PassengerType::Infant)
        .map(|(i, _)| i)
        .zip(adult_indices)
        .collect()
}

/// Build the provider passenger payload: derived titles, normalized phones
/// (falling back to the booking contact), infants attached to adults.
pub fn build_payloads(
    passengers: &[Passenger],
    contact: &ContactInfo,
    today: NaiveDate,
) -> Vec<PassengerPayload> {
    let mut payloads: Vec<PassengerPayload> = passengers
        .iter()
        .map(|p| {
            let phone = p
                .phone
                .as_deref()
                .and_then(normalize_phone)
                .or_else(|| normalize_phone(&contact.phone));
            PassengerPayload {
                title: derive_title(p.gender, p.date_of_birth, today).to_string(),
                given_name: p.given_name.clone(),
                family_name: p.family_name.clone(),
                gender: match p.gender {
                    Gender::Male => "m".to_string(),
                    Gender::Female => "f".to_string(),
                },
                born_on: p.date_of_birth,
                passenger_type: match p.passenger_type {
                    PassengerType::Adult => "adult".to_string(),
                    PassengerType::Child => "child".to_string(),
                    PassengerType::Infant => "infant_without_seat".to_string(),
                },
                email: p.email.clone().or_else(|| Some(contact.email.clone())),
                phone_number: phone,
                infant_ref: None,
            }
        })
        .collect();

    for (infant_idx, adult_idx) in pair_infants(passengers) {
        payloads[adult_idx].infant_ref = Some(infant_idx);
    }

    payloads
}
