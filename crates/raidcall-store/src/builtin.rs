//! Built-in templates seeded into an empty catalog.

use raidcall_core::{ClassInfo, EventTemplate, TemplateRole};

fn class(name: &str, emoji: &str, description: Option<&str>) -> ClassInfo {
    ClassInfo {
        name: name.into(),
        emoji: emoji.into(),
        description: description.map(str::to_string),
    }
}

/// The starter set: a 20-player raid, a 5-player dungeon and a 40-player battleground.
pub fn default_templates() -> Vec<EventTemplate> {
    vec![
        EventTemplate {
            name: "Raid 20".into(),
            icon: "⚔️".into(),
            description: "Standard 20-player raid".into(),
            max_participants: Some(20),
            allow_multi_signup: false,
            created_at: None,
            updated_at: None,
            roles: vec![
                TemplateRole {
                    name: "Tank".into(),
                    emoji: "🛡️".into(),
                    limit: 4,
                    classes: vec![
                        class("Paladin", "⚔️", Some("Holy tank")),
                        class("Warrior", "🪓", Some("Shield wall")),
                        class("Death Knight", "💀", Some("Plate and runes")),
                    ],
                },
                TemplateRole {
                    name: "DPS".into(),
                    emoji: "🏹".into(),
                    limit: 12,
                    classes: vec![
                        class("Hunter", "🎯", None),
                        class("Mage", "❄️", None),
                        class("Rogue", "🗡️", None),
                        class("Warlock", "🔥", None),
                    ],
                },
                TemplateRole {
                    name: "Support".into(),
                    emoji: "💖".into(),
                    limit: 4,
                    classes: vec![
                        class("Priest", "⛪", Some("Healer")),
                        class("Druid", "🌿", Some("Restoration")),
                        class("Shaman", "⚡", None),
                    ],
                },
            ],
        },
        EventTemplate {
            name: "Dungeon 5".into(),
            icon: "🏰".into(),
            description: "Five-player dungeon group".into(),
            max_participants: Some(5),
            allow_multi_signup: false,
            created_at: None,
            updated_at: None,
            roles: vec![
                TemplateRole {
                    name: "Tank".into(),
                    emoji: "🛡️".into(),
                    limit: 1,
                    classes: vec![class("Paladin", "⚔️", None), class("Warrior", "🪓", None)],
                },
                TemplateRole {
                    name: "DPS".into(),
                    emoji: "🏹".into(),
                    limit: 3,
                    classes: vec![
                        class("Hunter", "🎯", None),
                        class("Mage", "❄️", None),
                        class("Rogue", "🗡️", None),
                    ],
                },
                TemplateRole {
                    name: "Healer".into(),
                    emoji: "💚".into(),
                    limit: 1,
                    classes: vec![class("Priest", "⛪", None), class("Druid", "🌿", None)],
                },
            ],
        },
        EventTemplate {
            name: "PvP Battleground".into(),
            icon: "⚔️".into(),
            description: "Battleground team".into(),
            max_participants: Some(40),
            allow_multi_signup: false,
            created_at: None,
            updated_at: None,
            roles: vec![
                TemplateRole {
                    name: "Melee DPS".into(),
                    emoji: "🗡️".into(),
                    limit: 15,
                    classes: vec![
                        class("Warrior", "🪓", None),
                        class("Rogue", "🗡️", None),
                        class("Death Knight", "💀", None),
                    ],
                },
                TemplateRole {
                    name: "Ranged DPS".into(),
                    emoji: "🏹".into(),
                    limit: 15,
                    classes: vec![
                        class("Hunter", "🎯", None),
                        class("Mage", "❄️", None),
                        class("Warlock", "🔥", None),
                    ],
                },
                TemplateRole {
                    name: "Healer".into(),
                    emoji: "💚".into(),
                    limit: 10,
                    classes: vec![
                        class("Priest", "⛪", None),
                        class("Druid", "🌿", None),
                        class("Shaman", "⚡", None),
                    ],
                },
            ],
        },
    ]
}
