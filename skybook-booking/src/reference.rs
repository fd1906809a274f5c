use chrono::Utc;
use rand::Rng;

/// Generates human-readable booking references: `PREFIX-YYMMDD-NNNN`.
/// Collision-free by construction for practical volumes; the store layer's
/// unique index is the actual guarantee, and the intake regenerates on
/// conflict.
#[derive(Clone)]
pub struct ReferenceGenerator {
    prefix: String,
}

impl ReferenceGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_uppercase(),
        }
    }

    pub fn generate(&self) -> String {
        let date = Utc::now().format("%y%m%d");
        let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
        format!("{}-{}-{}", self.prefix, date, suffix)
    }
}
