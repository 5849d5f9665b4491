use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use lodge_shared::{Clock, SystemClock};
use crate::room::{Guests, HotelLocation, RatePlanType};

/// Everything needed to price one stay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCalculationInput {
    /// Nightly rate in the base currency (USD).
    pub base_rate: f64,
    pub number_of_nights: i32,
    pub hotel_id: String,
    pub room_type_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub currency: String,
    /// Multipliers relative to USD.
    #[serde(default = "default_exchange_rates")]
    pub exchange_rates: HashMap<String, f64>,
    #[serde(default)]
    pub rate_plan_type: RatePlanType,
    pub guests: Guests,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub vat_tax: i64,
    pub city_tax: i64,
    pub service_tax: i64,
    pub total_taxes: i64,
    pub tax_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub service_fee: i64,
    pub cleaning_fee: i64,
    pub resort_fee: i64,
    pub total_fees: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    pub early_booking: i64,
    pub length_of_stay: i64,
    /// Always zero for now; loyalty tiers are not wired in yet.
    pub loyalty: i64,
    pub promotional: i64,
    pub total_discounts: i64,
}

/// Derived price of a stay. Never persisted; recompute on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBreakdown {
    pub base_amount: i64,
    pub taxes: TaxBreakdown,
    pub fees: FeeBreakdown,
    pub discounts: DiscountBreakdown,
    pub total_amount: i64,
    pub currency: String,
    pub average_nightly_rate: i64,
    pub deposit_amount: i64,
    pub deposit_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Tunables for the rate calculator. Defaults are the published house rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Hotel id to the city it is located in.
    pub hotel_locations: HashMap<String, HotelLocation>,

    /// VAT by city
    pub tax_rates: HashMap<HotelLocation, f64>,

    /// VAT when the hotel or its city is unknown
    pub default_tax_rate: f64,

    pub city_tax_per_person_per_night: f64,

    /// City tax is only charged for this many nights.
    pub city_tax_max_nights: i32,

    pub service_fee_rate: f64,
    pub service_fee_min: i64,
    pub service_fee_max: i64,
    pub cleaning_fee_per_night: i64,

    pub early_booking_min_days: i64,
    pub early_booking_rate: f64,
    pub length_of_stay_min_nights: i32,
    pub length_of_stay_rate: f64,
    pub non_refundable_rate: f64,

    pub max_nights: i32,
    pub max_guests: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            hotel_locations: HashMap::new(),
            tax_rates: {
                let mut m = HashMap::new();
                m.insert(HotelLocation::Jerusalem, 0.17);
                m.insert(HotelLocation::Bethlehem, 0.16);
                m
            },
            default_tax_rate: 0.17,
            city_tax_per_person_per_night: 5.50,
            city_tax_max_nights: 7,
            service_fee_rate: 0.05,
            service_fee_min: 15,
            service_fee_max: 50,
            cleaning_fee_per_night: 20,
            early_booking_min_days: 30,
            early_booking_rate: 0.10,
            length_of_stay_min_nights: 7,
            length_of_stay_rate: 0.05,
            non_refundable_rate: 0.15,
            max_nights: 365,
            max_guests: 8,
        }
    }
}

/// Static fallback table, multipliers relative to USD.
pub fn default_exchange_rates() -> HashMap<String, f64> {
    let mut m = HashMap::new();
    m.insert("USD".to_string(), 1.0);
    m.insert("EUR".to_string(), 0.85);
    m.insert("GBP".to_string(), 0.75);
    m.insert("CAD".to_string(), 1.35);
    m.insert("AUD".to_string(), 1.45);
    m
}

/// Rate calculator for room stays.
///
/// Output depends on the input and on "today" (the early-booking discount
/// counts days until check-in), so the clock is injected.
pub struct RateCalculator {
    config: RateConfig,
    clock: Arc<dyn Clock>,
}

impl RateCalculator {
    pub fn new(config: RateConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn with_system_clock(config: RateConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// Validate and price a stay. Invalid input is rejected rather than priced.
    pub fn calculate_rate(&self, input: &RateCalculationInput) -> Result<RateBreakdown, RateError> {
        let report = self.validate_input(input);
        if !report.valid {
            return Err(RateError::InvalidInput(report.errors));
        }
        Ok(self.price(input))
    }

    /// Check a request against the booking rules without pricing it.
    pub fn validate_input(&self, input: &RateCalculationInput) -> ValidationReport {
        let mut errors = Vec::new();

        if input.base_rate.is_nan() || input.base_rate <= 0.0 {
            errors.push("Base rate must be greater than 0".to_string());
        }
        if input.number_of_nights <= 0 {
            errors.push("Number of nights must be greater than 0".to_string());
        } else if input.number_of_nights > self.config.max_nights {
            errors.push(format!(
                "Number of nights cannot exceed {}",
                self.config.max_nights
            ));
        }
        if input.guests.adults < 1 {
            errors.push("At least one adult is required".to_string());
        }
        if input.guests.total() > self.config.max_guests {
            errors.push(format!(
                "Total guests cannot exceed {}",
                self.config.max_guests
            ));
        }
        if input.check_in_date < self.clock.today() {
            errors.push("Check-in date cannot be in the past".to_string());
        }
        if input.check_out_date <= input.check_in_date {
            errors.push("Check-out date must be after check-in date".to_string());
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// VAT rate for a hotel, via its city.
    pub fn tax_rate_for(&self, hotel_id: &str) -> f64 {
        self.config
            .hotel_locations
            .get(hotel_id)
            .and_then(|location| self.config.tax_rates.get(location))
            .copied()
            .unwrap_or(self.config.default_tax_rate)
    }

    fn price(&self, input: &RateCalculationInput) -> RateBreakdown {
        let nights = i64::from(input.number_of_nights);
        let factor = input.exchange_rates.get(&input.currency).copied().unwrap_or(1.0);
        let base_amount = round(input.base_rate * factor * nights as f64);

        let taxes = self.taxes(input, base_amount);
        let fees = self.fees(base_amount, nights);
        let discounts = self.discounts(input, base_amount);

        let total_amount = base_amount + taxes.total_taxes + fees.total_fees - discounts.total_discounts;
        let deposit_percentage = input.rate_plan_type.deposit_percentage();

        RateBreakdown {
            base_amount,
            taxes,
            fees,
            discounts,
            total_amount,
            currency: input.currency.clone(),
            average_nightly_rate: round(total_amount as f64 / nights as f64),
            deposit_amount: round(total_amount as f64 * deposit_percentage),
            deposit_percentage,
        }
    }

    fn taxes(&self, input: &RateCalculationInput, base_amount: i64) -> TaxBreakdown {
        let tax_rate = self.tax_rate_for(&input.hotel_id);
        let vat_tax = round(base_amount as f64 * tax_rate);

        let taxed_nights = input.number_of_nights.min(self.config.city_tax_max_nights);
        let city_tax = round(
            f64::from(input.guests.total())
                * self.config.city_tax_per_person_per_night
                * f64::from(taxed_nights),
        );
        let service_tax = 0;

        TaxBreakdown {
            vat_tax,
            city_tax,
            service_tax,
            total_taxes: vat_tax + city_tax + service_tax,
            tax_rate,
        }
    }

    fn fees(&self, base_amount: i64, nights: i64) -> FeeBreakdown {
        let service_fee = round(base_amount as f64 * self.config.service_fee_rate)
            .clamp(self.config.service_fee_min, self.config.service_fee_max);
        let cleaning_fee = self.config.cleaning_fee_per_night * nights;
        let resort_fee = 0;

        FeeBreakdown {
            service_fee,
            cleaning_fee,
            resort_fee,
            total_fees: service_fee + cleaning_fee + resort_fee,
        }
    }

    fn discounts(&self, input: &RateCalculationInput, base_amount: i64) -> DiscountBreakdown {
        let base = base_amount as f64;
        let days_to_check_in = (input.check_in_date - self.clock.today()).num_days();

        let early_booking = if days_to_check_in >= self.config.early_booking_min_days {
            round(base * self.config.early_booking_rate)
        } else {
            0
        };

        let length_of_stay = if input.number_of_nights >= self.config.length_of_stay_min_nights {
            round(base * self.config.length_of_stay_rate)
        } else {
            0
        };

        let promotional = if input.rate_plan_type == RatePlanType::NonRefundable {
            round(base * self.config.non_refundable_rate)
        } else {
            0
        };

        let loyalty = 0;

        DiscountBreakdown {
            early_booking,
            length_of_stay,
            loyalty,
            promotional,
            total_discounts: early_booking + length_of_stay + loyalty + promotional,
        }
    }
}

fn round(value: f64) -> i64 {
    value.round() as i64
}

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Invalid rate request: {}", .0.join("; "))]
    InvalidInput(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use lodge_shared::ManualClock;

    const JERUSALEM_HOTEL: &str = "king-david-jerusalem";
    const BETHLEHEM_HOTEL: &str = "manger-square-bethlehem";

    fn calculator() -> (RateCalculator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()));
        let mut config = RateConfig::default();
        config.hotel_locations.insert(JERUSALEM_HOTEL.to_string(), HotelLocation::Jerusalem);
        config.hotel_locations.insert(BETHLEHEM_HOTEL.to_string(), HotelLocation::Bethlehem);
        (RateCalculator::new(config, clock.clone()), clock)
    }

    fn input(calc_today: NaiveDate, days_out: i64, nights: i32) -> RateCalculationInput {
        let check_in = calc_today + Duration::days(days_out);
        RateCalculationInput {
            base_rate: 100.0,
            number_of_nights: nights,
            hotel_id: JERUSALEM_HOTEL.to_string(),
            room_type_id: "deluxe-king".to_string(),
            check_in_date: check_in,
            check_out_date: check_in + Duration::days(i64::from(nights.max(1))),
            currency: "USD".to_string(),
            exchange_rates: HashMap::from([("USD".to_string(), 1.0)]),
            rate_plan_type: RatePlanType::Flexible,
            guests: Guests { adults: 2, children: 0 },
        }
    }

    #[test]
    fn test_three_night_flexible_stay_booked_early() {
        let (calc, clock) = calculator();
        let breakdown = calc.calculate_rate(&input(clock.today(), 40, 3)).unwrap();

        assert_eq!(breakdown.base_amount, 300);
        assert_eq!(breakdown.taxes.vat_tax, 51);
        assert_eq!(breakdown.taxes.city_tax, 33);
        assert_eq!(breakdown.taxes.total_taxes, 84);
        assert_eq!(breakdown.fees.service_fee, 15);
        assert_eq!(breakdown.fees.cleaning_fee, 60);
        assert_eq!(breakdown.fees.total_fees, 75);
        assert_eq!(breakdown.discounts.early_booking, 30);
        assert_eq!(breakdown.discounts.total_discounts, 30);
        assert_eq!(breakdown.total_amount, 429);
        assert_eq!(breakdown.deposit_percentage, 0.30);
        assert_eq!(breakdown.deposit_amount, 129);
        assert_eq!(breakdown.average_nightly_rate, 143);
    }

    #[test]
    fn test_pricing_is_repeatable() {
        let (calc, clock) = calculator();
        let request = input(clock.today(), 12, 4);

        let first = calc.calculate_rate(&request).unwrap();
        let second = calc.calculate_rate(&request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_early_booking_discount_depends_on_today() {
        let (calc, clock) = calculator();
        let request = input(clock.today(), 30, 2);
        assert_eq!(calc.calculate_rate(&request).unwrap().discounts.early_booking, 20);

        clock.advance(Duration::days(1));
        assert_eq!(calc.calculate_rate(&request).unwrap().discounts.early_booking, 0);
    }

    #[test]
    fn test_bethlehem_vat_and_unknown_hotel_default() {
        let (calc, clock) = calculator();
        let mut request = input(clock.today(), 5, 2);

        request.hotel_id = BETHLEHEM_HOTEL.to_string();
        let breakdown = calc.calculate_rate(&request).unwrap();
        assert_eq!(breakdown.taxes.tax_rate, 0.16);
        assert_eq!(breakdown.taxes.vat_tax, 32);

        request.hotel_id = "somewhere-else".to_string();
        assert_eq!(calc.calculate_rate(&request).unwrap().taxes.tax_rate, 0.17);
    }

    #[test]
    fn test_long_non_refundable_stay_stacks_discounts() {
        let (calc, clock) = calculator();
        let mut request = input(clock.today(), 45, 10);
        request.rate_plan_type = RatePlanType::NonRefundable;

        let breakdown = calc.calculate_rate(&request).unwrap();
        assert_eq!(breakdown.base_amount, 1000);
        assert_eq!(breakdown.discounts.early_booking, 100);
        assert_eq!(breakdown.discounts.length_of_stay, 50);
        assert_eq!(breakdown.discounts.promotional, 150);
        assert_eq!(breakdown.discounts.loyalty, 0);
        assert_eq!(breakdown.discounts.total_discounts, 300);
        // city tax stops at seven nights
        assert_eq!(breakdown.taxes.city_tax, 77);
        // service fee capped
        assert_eq!(breakdown.fees.service_fee, 50);
        assert_eq!(breakdown.deposit_percentage, 0.20);
    }

    #[test]
    fn test_currency_conversion_and_missing_rate() {
        let (calc, clock) = calculator();
        let mut request = input(clock.today(), 5, 2);
        request.currency = "EUR".to_string();
        request.exchange_rates = default_exchange_rates();
        assert_eq!(calc.calculate_rate(&request).unwrap().base_amount, 170);

        request.currency = "ILS".to_string();
        let breakdown = calc.calculate_rate(&request).unwrap();
        assert_eq!(breakdown.base_amount, 200);
        assert_eq!(breakdown.currency, "ILS");
    }

    #[test]
    fn test_zero_nights_is_rejected() {
        let (calc, clock) = calculator();
        let request = input(clock.today(), 5, 0);

        let report = calc.validate_input(&request);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("nights")));

        let err = calc.calculate_rate(&request).unwrap_err();
        assert!(err.to_string().contains("nights"));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let (calc, clock) = calculator();
        let mut request = input(clock.today(), -1, 400);
        request.base_rate = 0.0;
        request.guests = Guests { adults: 0, children: 9 };

        let report = calc.validate_input(&request);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 5);
        assert!(report.errors.iter().any(|e| e.contains("365")));
        assert!(report.errors.iter().any(|e| e.contains("past")));
        assert!(report.errors.iter().any(|e| e.contains("adult")));
    }

    #[test]
    fn test_checkout_before_checkin_is_rejected() {
        let (calc, clock) = calculator();
        let mut request = input(clock.today(), 5, 2);
        request.check_out_date = request.check_in_date;

        let report = calc.validate_input(&request);
        assert_eq!(report.errors, vec!["Check-out date must be after check-in date".to_string()]);
    }

    #[test]
    fn test_huge_guest_counts_do_not_wrap() {
        let (calc, clock) = calculator();
        let mut request = input(clock.today(), 40, 3);
        request.guests = Guests { adults: u32::MAX, children: 1 };

        let report = calc.validate_input(&request);
        assert_eq!(report.errors, vec!["Total guests cannot exceed 8".to_string()]);
        assert!(calc.calculate_rate(&request).is_err());
    }
}
