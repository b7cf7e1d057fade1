use serde::{Deserialize, Serialize};

use super::InvalidEnumValue;

/// Macro to generate enum with wire string + as_str + std::str::FromStr
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnumValue {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(
    /// Urgency tier. Declaration order gives the total urgency order
    /// GREEN < YELLOW < RED, so `Ord` compares by urgency.
    #[derive(PartialOrd, Ord, Hash)]
    TriageLevel {
        Green => "GREEN",
        Yellow => "YELLOW",
        Red => "RED",
    }
);

str_enum!(
    /// Classifier's self-reported confidence inverse.
    #[derive(PartialOrd, Ord, Hash)]
    UncertaintyLevel {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
);

str_enum!(
    #[derive(Hash)]
    SymptomCategory {
        Respiratory => "respiratory",
        Gastrointestinal => "gastrointestinal",
        Neurological => "neurological",
        Cardiovascular => "cardiovascular",
        Fever => "fever",
        Pain => "pain",
        Other => "other",
    }
);

str_enum!(
    #[derive(PartialOrd, Ord)]
    PainSeverity {
        Mild => "mild",
        Moderate => "moderate",
        Severe => "severe",
    }
);

str_enum!(Sex {
    Male => "M",
    Female => "F",
    Other => "O",
});

str_enum!(EncounterStatus {
    Created => "created",
    InProgress => "in_progress",
    Completed => "completed",
});
