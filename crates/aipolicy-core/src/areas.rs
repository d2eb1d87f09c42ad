//! The ten canonical AI-policy areas.
//!
//! Area ids are stable kebab-case identifiers used as map keys and palette
//! indices. Display names and ids are in one-to-one correspondence; the
//! legacy alias is the spelling older backend payloads still emit.

use serde::{Deserialize, Serialize};

/// Stable identifier of one of the ten canonical policy areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AreaId {
    AiSafety,
    CyberSafety,
    DigitalEducation,
    DigitalInclusion,
    DigitalLeisure,
    Disinformation,
    DigitalWork,
    MentalHealth,
    PhysicalHealth,
    SocialMediaGaming,
}

impl AreaId {
    /// All area ids in taxonomy order.
    pub const ALL: [AreaId; 10] = [
        AreaId::AiSafety,
        AreaId::CyberSafety,
        AreaId::DigitalEducation,
        AreaId::DigitalInclusion,
        AreaId::DigitalLeisure,
        AreaId::Disinformation,
        AreaId::DigitalWork,
        AreaId::MentalHealth,
        AreaId::PhysicalHealth,
        AreaId::SocialMediaGaming,
    ];

    /// Kebab-case id, e.g. `"ai-safety"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.area().id
    }

    /// The full taxonomy entry for this id.
    #[must_use]
    pub fn area(self) -> &'static PolicyArea {
        &POLICY_AREAS[self.index()]
    }

    /// Position of this area in [`POLICY_AREAS`] and in area palettes.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            AreaId::AiSafety => 0,
            AreaId::CyberSafety => 1,
            AreaId::DigitalEducation => 2,
            AreaId::DigitalInclusion => 3,
            AreaId::DigitalLeisure => 4,
            AreaId::Disinformation => 5,
            AreaId::DigitalWork => 6,
            AreaId::MentalHealth => 7,
            AreaId::PhysicalHealth => 8,
            AreaId::SocialMediaGaming => 9,
        }
    }

    /// Parses a kebab-case id exactly. Display names are resolved by the
    /// normalizer, not here.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        POLICY_AREAS.iter().find(|a| a.id == id).map(|a| a.area_id)
    }
}

impl std::fmt::Display for AreaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AreaId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("unknown policy area id '{s}'"))
    }
}

/// One entry of the policy-area taxonomy.
#[derive(Debug, PartialEq, Eq)]
pub struct PolicyArea {
    pub area_id: AreaId,
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub legacy_name: &'static str,
}

pub static POLICY_AREAS: [PolicyArea; 10] = [
    PolicyArea {
        area_id: AreaId::AiSafety,
        id: "ai-safety",
        name: "AI Safety",
        icon: "🛡️",
        legacy_name: "AI Safety",
    },
    PolicyArea {
        area_id: AreaId::CyberSafety,
        id: "cyber-safety",
        name: "Cyber Safety",
        icon: "🔒",
        legacy_name: "CyberSafety",
    },
    PolicyArea {
        area_id: AreaId::DigitalEducation,
        id: "digital-education",
        name: "Digital Education",
        icon: "🎓",
        legacy_name: "Digital Education",
    },
    PolicyArea {
        area_id: AreaId::DigitalInclusion,
        id: "digital-inclusion",
        name: "Digital Inclusion",
        icon: "🤝",
        legacy_name: "Digital Inclusion",
    },
    PolicyArea {
        area_id: AreaId::DigitalLeisure,
        id: "digital-leisure",
        name: "Digital Leisure",
        icon: "🎮",
        legacy_name: "Digital Leisure",
    },
    PolicyArea {
        area_id: AreaId::Disinformation,
        id: "disinformation",
        name: "(Dis)Information",
        icon: "📰",
        legacy_name: "Disinformation",
    },
    PolicyArea {
        area_id: AreaId::DigitalWork,
        id: "digital-work",
        name: "Digital Work",
        icon: "💼",
        legacy_name: "Digital Work",
    },
    PolicyArea {
        area_id: AreaId::MentalHealth,
        id: "mental-health",
        name: "Mental Health",
        icon: "🧠",
        legacy_name: "Mental Health",
    },
    PolicyArea {
        area_id: AreaId::PhysicalHealth,
        id: "physical-health",
        name: "Physical Health",
        icon: "🏃",
        legacy_name: "Physical Health",
    },
    PolicyArea {
        area_id: AreaId::SocialMediaGaming,
        id: "social-media-gaming",
        name: "Social Media/Gaming Regulation",
        icon: "📱",
        legacy_name: "Social Media Gaming Regulation",
    },
];
