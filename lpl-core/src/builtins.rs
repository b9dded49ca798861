//! The processor's built-in environment.
//!
//! Everything the processor exposes to programs lives here as
//! declarative data: the literal keywords, the named constants, and
//! the procedures that expand to device instructions, including the
//! combinatorially generated search families. The checker constructs
//! the environment once per compilation through [`built_in_source`]
//! and resolves against it like any other source; none of the
//! resolution or lowering logic knows the catalogue's contents.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::semantic::{
    BuiltinConstant, BuiltinProcedure, Definition, Keyword, Known, Name, Source,
};

/// Named constants of the processor. Spelled as the device spells
/// them; identifiers at the language level replace dashes with
/// underscores.
pub const PROPERTIES: &[&str] = &[
    "additive-reconstructor",
    "advanced-launch-pad",
    "aegires",
    "afflict",
    "air",
    "air-factory",
    "alpha",
    "ammo",
    "ammoCapacity",
    "anthicus",
    "anthicus-missile",
    "antumbra",
    "arc",
    "arkycite",
    "arkycite-floor",
    "arkyic-boulder",
    "arkyic-stone",
    "arkyic-vent",
    "arkyic-wall",
    "arkyid",
    "armor",
    "armored-conveyor",
    "armored-duct",
    "assembly-drone",
    "atmospheric-concentrator",
    "atrax",
    "avert",
    "basalt",
    "basalt-boulder",
    "basalt-vent",
    "basic-assembler-module",
    "battery",
    "battery-large",
    "beam-link",
    "beam-node",
    "beam-tower",
    "beryllic-boulder",
    "beryllic-stone",
    "beryllic-stone-wall",
    "beryllium",
    "beryllium-wall",
    "beryllium-wall-large",
    "beta",
    "blast-compound",
    "blast-door",
    "blast-drill",
    "blast-mixer",
    "blockCount",
    "blue",
    "bluemat",
    "boosting",
    "boulder",
    "breach",
    "bridge-conduit",
    "bridge-conveyor",
    "bryde",
    "bufferUsage",
    "build-tower",
    "build1",
    "build10",
    "build11",
    "build12",
    "build13",
    "build14",
    "build15",
    "build16",
    "build2",
    "build3",
    "build4",
    "build5",
    "build6",
    "build7",
    "build8",
    "build9",
    "cameraHeight",
    "cameraWidth",
    "cameraX",
    "cameraY",
    "canvas",
    "carbide",
    "carbide-crucible",
    "carbide-wall",
    "carbide-wall-large",
    "carbon-boulder",
    "carbon-stone",
    "carbon-vent",
    "carbon-wall",
    "char",
    "chemical-combustion-chamber",
    "cleroi",
    "client",
    "clientLocale",
    "clientMobile",
    "clientName",
    "clientTeam",
    "clientUnit",
    "cliff",
    "cliff-crusher",
    "coal",
    "coal-centrifuge",
    "collaris",
    "color",
    "colorAccent",
    "colorAcid",
    "colorBlack",
    "colorBlue",
    "colorBrick",
    "colorBrown",
    "colorClear",
    "colorCoral",
    "colorCrimson",
    "colorCyan",
    "colorDarkgray",
    "colorDarkgrey",
    "colorForest",
    "colorGold",
    "colorGoldenrod",
    "colorGray",
    "colorGreen",
    "colorGrey",
    "colorHighlight",
    "colorLightgray",
    "colorLightgrey",
    "colorLime",
    "colorMagenta",
    "colorMaroon",
    "colorNavy",
    "colorNegstat",
    "colorOlive",
    "colorOrange",
    "colorPink",
    "colorPurple",
    "colorRed",
    "colorRoyal",
    "colorSalmon",
    "colorScarlet",
    "colorSky",
    "colorSlate",
    "colorStat",
    "colorTan",
    "colorTeal",
    "colorUnlaunched",
    "colorViolet",
    "colorWhite",
    "colorYellow",
    "combustion-generator",
    "conduit",
    "config",
    "conquer",
    "constructor",
    "container",
    "controlled",
    "controller",
    "conveyor",
    "copper",
    "copper-wall",
    "copper-wall-large",
    "core-acropolis",
    "core-bastion",
    "core-citadel",
    "core-foundation",
    "core-nucleus",
    "core-shard",
    "core-zone",
    "corvus",
    "counter",
    "crater-stone",
    "crawler",
    "crux",
    "cryofluid",
    "cryofluid-mixer",
    "crystal-blocks",
    "crystal-cluster",
    "crystal-floor",
    "crystal-orbs",
    "crystalline-boulder",
    "crystalline-stone",
    "crystalline-stone-wall",
    "crystalline-vent",
    "ctrlCommand",
    "ctrlPlayer",
    "ctrlProcessor",
    "cultivator",
    "currentAmmoType",
    "cyanogen",
    "cyanogen-synthesizer",
    "cyclone",
    "cyerce",
    "dacite",
    "dacite-boulder",
    "dacite-wall",
    "dagger",
    "dark-metal",
    "dark-panel-1",
    "dark-panel-2",
    "dark-panel-3",
    "dark-panel-4",
    "dark-panel-5",
    "dark-panel-6",
    "darksand",
    "darksand-tainted-water",
    "darksand-water",
    "dead",
    "deconstructor",
    "deep-tainted-water",
    "deep-water",
    "degToRad",
    "dense-red-stone",
    "derelict",
    "differential-generator",
    "diffuse",
    "diode",
    "dirt",
    "dirt-wall",
    "disassembler",
    "disperse",
    "displayHeight",
    "displayWidth",
    "disrupt",
    "disrupt-missile",
    "distributor",
    "door",
    "door-large",
    "dormant-cyst",
    "duct",
    "duct-bridge",
    "duct-router",
    "duct-unloader",
    "dune-wall",
    "duo",
    "e",
    "eclipse",
    "efficiency",
    "electric-heater",
    "electrolyzer",
    "elude",
    "emanate",
    "empty",
    "enabled",
    "eruption-drill",
    "evoke",
    "exponential-reconstructor",
    "ferric-boulder",
    "ferric-craters",
    "ferric-stone",
    "ferric-stone-wall",
    "firstItem",
    "fissile-matter",
    "flag",
    "flare",
    "flux-reactor",
    "fog",
    "force-projector",
    "foreshadow",
    "fortress",
    "fuse",
    "gallium",
    "gamma",
    "graphite",
    "graphite-press",
    "graphitic-wall",
    "grass",
    "green",
    "ground-factory",
    "hail",
    "health",
    "heat",
    "heat-reactor",
    "heat-redirector",
    "heat-router",
    "heat-source",
    "horizon",
    "hotrock",
    "hydrogen",
    "hyper-processor",
    "ice",
    "ice-snow",
    "ice-wall",
    "id",
    "illuminator",
    "impact-drill",
    "impact-reactor",
    "impulse-pump",
    "incinerator",
    "incite",
    "interplanetary-accelerator",
    "inverted-sorter",
    "ipt",
    "item-source",
    "item-void",
    "itemCapacity",
    "itemCount",
    "junction",
    "kiln",
    "lancer",
    "landing-pad",
    "large-cliff-crusher",
    "large-constructor",
    "large-logic-display",
    "large-payload-mass-driver",
    "large-plasma-bore",
    "large-shield-projector",
    "laser-drill",
    "latum",
    "launch-pad",
    "lead",
    "links",
    "liquid-container",
    "liquid-junction",
    "liquid-router",
    "liquid-source",
    "liquid-tank",
    "liquid-void",
    "liquidCapacity",
    "liquidCount",
    "locus",
    "logic-display",
    "logic-processor",
    "lustre",
    "mace",
    "magmarock",
    "malign",
    "malis",
    "manifold",
    "maph",
    "mapw",
    "mass-driver",
    "maxHealth",
    "mech-assembler",
    "mech-fabricator",
    "mech-refabricator",
    "mechanical-drill",
    "mechanical-pump",
    "mega",
    "meltdown",
    "melter",
    "memory-bank",
    "memory-cell",
    "memoryCapacity",
    "mend-projector",
    "mender",
    "merui",
    "message",
    "metaglass",
    "metal-floor",
    "metal-floor-2",
    "metal-floor-3",
    "metal-floor-4",
    "metal-floor-5",
    "metal-floor-damaged",
    "micro-processor",
    "mineX",
    "mineY",
    "mining",
    "minke",
    "minute",
    "molten-slag",
    "mono",
    "moss",
    "mud",
    "multi-press",
    "multiplicative-reconstructor",
    "name",
    "naval-factory",
    "navanax",
    "neoplasia-reactor",
    "neoplasm",
    "nitrogen",
    "nova",
    "obviate",
    "oct",
    "oil",
    "oil-extractor",
    "omura",
    "ore-beryllium",
    "ore-coal",
    "ore-copper",
    "ore-crystal-thorium",
    "ore-lead",
    "ore-scrap",
    "ore-thorium",
    "ore-titanium",
    "ore-tungsten",
    "ore-wall-beryllium",
    "ore-wall-thorium",
    "ore-wall-tungsten",
    "overdrive-dome",
    "overdrive-projector",
    "overflow-duct",
    "overflow-gate",
    "oxidation-chamber",
    "oxide",
    "oxynoe",
    "ozone",
    "parallax",
    "payload-conveyor",
    "payload-loader",
    "payload-mass-driver",
    "payload-router",
    "payload-source",
    "payload-unloader",
    "payload-void",
    "payloadCapacity",
    "payloadCount",
    "payloadType",
    "pebbles",
    "phase-conduit",
    "phase-conveyor",
    "phase-fabric",
    "phase-heater",
    "phase-synthesizer",
    "phase-wall",
    "phase-wall-large",
    "phase-weaver",
    "pi",
    "pine",
    "plasma-bore",
    "plastanium",
    "plastanium-compressor",
    "plastanium-conveyor",
    "plastanium-wall",
    "plastanium-wall-large",
    "plated-conduit",
    "pneumatic-drill",
    "poly",
    "pooled-cryofluid",
    "power-node",
    "power-node-large",
    "power-source",
    "power-void",
    "powerCapacity",
    "powerNetCapacity",
    "powerNetIn",
    "powerNetOut",
    "powerNetStored",
    "precept",
    "prime-refabricator",
    "progress",
    "pulsar",
    "pulse-conduit",
    "pulverizer",
    "pur-bush",
    "pyratite",
    "pyratite-mixer",
    "pyrolysis-generator",
    "quad",
    "quasar",
    "quell",
    "quell-missile",
    "radar",
    "radToDeg",
    "rain",
    "range",
    "red-diamond-wall",
    "red-ice",
    "red-ice-boulder",
    "red-ice-wall",
    "red-stone",
    "red-stone-boulder",
    "red-stone-vent",
    "red-stone-wall",
    "redmat",
    "redweed",
    "regen-projector",
    "regolith",
    "regolith-wall",
    "reign",
    "reinforced-bridge-conduit",
    "reinforced-conduit",
    "reinforced-container",
    "reinforced-liquid-container",
    "reinforced-liquid-junction",
    "reinforced-liquid-router",
    "reinforced-liquid-tank",
    "reinforced-message",
    "reinforced-payload-conveyor",
    "reinforced-payload-router",
    "reinforced-pump",
    "reinforced-surge-wall",
    "reinforced-surge-wall-large",
    "reinforced-vault",
    "remove-ore",
    "remove-wall",
    "renale",
    "repair-point",
    "repair-turret",
    "retusa",
    "rhyolite",
    "rhyolite-boulder",
    "rhyolite-crater",
    "rhyolite-vent",
    "rhyolite-wall",
    "ripple",
    "risso",
    "rotary-pump",
    "rotation",
    "rough-rhyolite",
    "router",
    "rtg-generator",
    "salt",
    "salt-wall",
    "salvo",
    "sand",
    "sand-boulder",
    "sand-floor",
    "sand-wall",
    "sand-water",
    "sandstorm",
    "scathe",
    "scathe-missile",
    "scathe-missile-phase",
    "scathe-missile-surge",
    "scathe-missile-surge-split",
    "scatter",
    "scepter",
    "scorch",
    "scrap",
    "scrap-wall",
    "scrap-wall-gigantic",
    "scrap-wall-huge",
    "scrap-wall-large",
    "second",
    "segment",
    "sei",
    "separator",
    "server",
    "sfx-artillery",
    "sfx-back",
    "sfx-bang",
    "sfx-beam",
    "sfx-bigshot",
    "sfx-bioLoop",
    "sfx-blaster",
    "sfx-bolt",
    "sfx-boom",
    "sfx-break",
    "sfx-build",
    "sfx-buttonClick",
    "sfx-cannon",
    "sfx-chatMessage",
    "sfx-click",
    "sfx-combustion",
    "sfx-conveyor",
    "sfx-corexplode",
    "sfx-cutter",
    "sfx-door",
    "sfx-drill",
    "sfx-drillCharge",
    "sfx-drillImpact",
    "sfx-dullExplosion",
    "sfx-electricHum",
    "sfx-explosion",
    "sfx-explosionbig",
    "sfx-extractLoop",
    "sfx-fire",
    "sfx-flame",
    "sfx-flame2",
    "sfx-flux",
    "sfx-glow",
    "sfx-grinding",
    "sfx-hum",
    "sfx-largeCannon",
    "sfx-largeExplosion",
    "sfx-laser",
    "sfx-laserbeam",
    "sfx-laserbig",
    "sfx-laserblast",
    "sfx-lasercharge",
    "sfx-lasercharge2",
    "sfx-lasershoot",
    "sfx-machine",
    "sfx-malignShoot",
    "sfx-mediumCannon",
    "sfx-message",
    "sfx-minebeam",
    "sfx-mineDeploy",
    "sfx-missile",
    "sfx-missileLarge",
    "sfx-missileLaunch",
    "sfx-missileSmall",
    "sfx-missileTrail",
    "sfx-mud",
    "sfx-noammo",
    "sfx-pew",
    "sfx-place",
    "sfx-plantBreak",
    "sfx-plasmaboom",
    "sfx-plasmadrop",
    "sfx-press",
    "sfx-pulse",
    "sfx-pulseBlast",
    "sfx-railgun",
    "sfx-rain",
    "sfx-release",
    "sfx-respawn",
    "sfx-respawning",
    "sfx-rockBreak",
    "sfx-sap",
    "sfx-shield",
    "sfx-shockBlast",
    "sfx-shoot",
    "sfx-shootAlt",
    "sfx-shootAltLong",
    "sfx-shootBig",
    "sfx-shootSmite",
    "sfx-shootSnap",
    "sfx-shotgun",
    "sfx-smelter",
    "sfx-spark",
    "sfx-spellLoop",
    "sfx-splash",
    "sfx-spray",
    "sfx-steam",
    "sfx-techloop",
    "sfx-thruster",
    "sfx-titanExplosion",
    "sfx-torch",
    "sfx-tractorbeam",
    "sfx-unlock",
    "sfx-wave",
    "sfx-wind",
    "sfx-wind2",
    "sfx-wind3",
    "sfx-windhowl",
    "shale",
    "shale-boulder",
    "shale-wall",
    "shallow-water",
    "sharded",
    "shield",
    "shield-projector",
    "shielded-wall",
    "ship-assembler",
    "ship-fabricator",
    "ship-refabricator",
    "shock-mine",
    "shockwave-tower",
    "shoot",
    "shooting",
    "shootp",
    "shootX",
    "shootY",
    "shrubs",
    "silicon",
    "silicon-arc-furnace",
    "silicon-crucible",
    "silicon-smelter",
    "size",
    "slag",
    "slag-centrifuge",
    "slag-heater",
    "slag-incinerator",
    "small-deconstructor",
    "small-heat-redirector",
    "smite",
    "snow",
    "snow-boulder",
    "snow-pine",
    "snow-wall",
    "snowing",
    "solar-panel",
    "solar-panel-large",
    "solid",
    "sorter",
    "space",
    "spawn",
    "spectre",
    "speed",
    "spiroct",
    "spore-cluster",
    "spore-moss",
    "spore-pine",
    "spore-pod",
    "spore-press",
    "spore-wall",
    "sporestorm",
    "steam-generator",
    "stell",
    "stone",
    "stone-vent",
    "stone-wall",
    "sublimate",
    "surge-alloy",
    "surge-conveyor",
    "surge-crucible",
    "surge-router",
    "surge-smelter",
    "surge-tower",
    "surge-wall",
    "surge-wall-large",
    "suspend-particles",
    "swarmer",
    "switch",
    "tainted-water",
    "tank-assembler",
    "tank-fabricator",
    "tank-refabricator",
    "tar",
    "team",
    "tecta",
    "tendrils",
    "tetrative-reconstructor",
    "thermal-generator",
    "this",
    "thisx",
    "thisy",
    "thorium",
    "thorium-reactor",
    "thorium-wall",
    "thorium-wall-large",
    "thruster",
    "tick",
    "tile-logic-display",
    "time",
    "timescale",
    "titan",
    "titanium",
    "titanium-conveyor",
    "titanium-wall",
    "titanium-wall-large",
    "totalItems",
    "totalLiquids",
    "totalPayload",
    "totalPower",
    "toxopid",
    "tsunami",
    "tungsten",
    "tungsten-wall",
    "tungsten-wall-large",
    "turbine-condenser",
    "type",
    "underflow-duct",
    "underflow-gate",
    "unit",
    "unit-cargo-loader",
    "unit-cargo-unload-point",
    "unit-repair-tower",
    "unitCount",
    "unloader",
    "vanquish",
    "vault",
    "vela",
    "velocityX",
    "velocityY",
    "vent-condenser",
    "vibrant-crystal-cluster",
    "water",
    "water-extractor",
    "wave",
    "waveNumber",
    "waveTime",
    "white-tree",
    "white-tree-dead",
    "world-cell",
    "world-message",
    "world-processor",
    "world-switch",
    "x",
    "y",
    "yellow-stone",
    "yellow-stone-boulder",
    "yellow-stone-plates",
    "yellow-stone-vent",
    "yellow-stone-wall",
    "yellowcoral",
    "zenith",
];

/// Procedures that expand to one device instruction, as
/// `(instruction, subinstruction, parameter count)`. A procedure
/// with a subinstruction is named `instruction_subinstruction` and
/// expands to `instruction subinstruction`.
pub const PROCEDURES: &[(&str, Option<&str>, u32)] = &[
    ("read", None, 3),
    ("write", None, 3),
    ("draw", Some("clear"), 3),
    ("draw", Some("color"), 4),
    ("draw", Some("col"), 1),
    ("draw", Some("stroke"), 1),
    ("draw", Some("line"), 4),
    ("draw", Some("rect"), 4),
    ("draw", Some("lineRect"), 4),
    ("draw", Some("poly"), 5),
    ("draw", Some("linePoly"), 5),
    ("draw", Some("triangle"), 6),
    ("draw", Some("image"), 5),
    ("drawflush", None, 1),
    ("packcolor", None, 4),
    ("print", None, 1),
    ("printflush", None, 1),
    ("getlink", None, 2),
    ("control", Some("enabled"), 2),
    ("control", Some("shoot"), 4),
    ("control", Some("shootp"), 3),
    ("control", Some("config"), 2),
    ("control", Some("color"), 2),
    ("sensor", None, 3),
    ("wait", None, 1),
    ("stop", None, 0),
    ("lookup", Some("block"), 2),
    ("lookup", Some("unit"), 2),
    ("lookup", Some("item"), 2),
    ("lookup", Some("liquid"), 2),
    ("ubind", None, 1),
    ("ucontrol", Some("idle"), 0),
    ("ucontrol", Some("stop"), 0),
    ("ucontrol", Some("move"), 2),
    ("ucontrol", Some("approach"), 3),
    ("ucontrol", Some("pathfind"), 2),
    ("ucontrol", Some("autoPathfind"), 0),
    ("ucontrol", Some("boost"), 1),
    ("ucontrol", Some("target"), 3),
    ("ucontrol", Some("targetp"), 2),
    ("ucontrol", Some("itemDrop"), 2),
    ("ucontrol", Some("itemTake"), 3),
    ("ucontrol", Some("payDrop"), 0),
    ("ucontrol", Some("payTake"), 1),
    ("ucontrol", Some("payEnter"), 0),
    ("ucontrol", Some("mine"), 2),
    ("ucontrol", Some("flag"), 1),
    ("ucontrol", Some("build"), 5),
    ("ucontrol", Some("getBlock"), 5),
    ("ucontrol", Some("within"), 4),
    ("ucontrol", Some("unbind"), 0),
    ("op", Some("max"), 3),
    ("op", Some("min"), 3),
    ("op", Some("angle"), 3),
    ("op", Some("angleDiff"), 3),
    ("op", Some("len"), 3),
    ("op", Some("noise"), 3),
    ("op", Some("abs"), 2),
    ("op", Some("log"), 2),
    ("op", Some("log10"), 2),
    ("op", Some("floor"), 2),
    ("op", Some("ceil"), 2),
    ("op", Some("sqrt"), 2),
    ("op", Some("rand"), 2),
    ("op", Some("sin"), 2),
    ("op", Some("cos"), 2),
    ("op", Some("tan"), 2),
    ("op", Some("asin"), 2),
    ("op", Some("acos"), 2),
    ("op", Some("atan"), 2),
];

/// Category filters of the search procedures.
pub const FILTERS: &[&str] =
    &["enemy", "ally", "player", "attacker", "flying", "boss", "ground"];

/// Metrics the search procedures can order results by.
pub const METRICS: &[&str] = &["distance", "health", "shield", "armor", "maxHealth"];

/// Building categories the locator procedures can look for.
pub const BUILDINGS: &[&str] = &[
    "core",
    "storage",
    "generator",
    "turret",
    "factory",
    "repair",
    "battery",
    "reactor",
];

/// Constructs the implicit built-in source.
pub fn built_in_source() -> Source {
    let mut globals = BTreeMap::new();
    define(&mut globals, keyword("false", Known::False));
    define(&mut globals, keyword("true", Known::True));
    define(&mut globals, keyword("null", Known::Null));
    for property in PROPERTIES {
        define(
            &mut globals,
            Definition::BuiltinConstant(BuiltinConstant {
                name: Name::built_in(property.replace('-', "_")),
                property: (*property).to_owned(),
            }),
        );
    }
    for (instruction, subinstruction, parameters) in PROCEDURES {
        let (identifier, instruction) = match subinstruction {
            Some(subinstruction) => (
                format!("{instruction}_{subinstruction}"),
                format!("{instruction} {subinstruction}"),
            ),
            None => ((*instruction).to_owned(), (*instruction).to_owned()),
        };
        define(
            &mut globals,
            procedure(identifier, instruction, None, *parameters),
        );
    }
    define_search_families(&mut globals);
    define(
        &mut globals,
        procedure("ulocate_ore", "ulocate ore core 0", None, 4),
    );
    define(
        &mut globals,
        procedure("ulocate_spawn", "ulocate spawn core 0 0", None, 4),
    );
    define(
        &mut globals,
        procedure("ulocate_damaged", "ulocate damaged core 0 0", None, 4),
    );
    for building in BUILDINGS {
        define(
            &mut globals,
            procedure(
                format!("ulocate_building_{building}"),
                format!("ulocate building {building}"),
                Some("0"),
                5,
            ),
        );
    }
    Source { globals }
}

/// Generates the block-bound and unit-bound search procedures: one
/// for every combination of up to three filters crossed with every
/// metric. The combinations are enumerated as no filter, then each
/// single filter, then each pair, then each triple; absent filter
/// positions read `any` in the instruction.
fn define_search_families(globals: &mut BTreeMap<String, Definition>) {
    let mut combination_names = vec![String::new()];
    let mut combination_operands = vec!["any any any".to_owned()];
    for i in 0..FILTERS.len() {
        combination_names.push(FILTERS[i].to_owned());
        combination_operands.push(format!("{} any any", FILTERS[i]));
        for j in i + 1..FILTERS.len() {
            combination_names.push(format!("{}_{}", FILTERS[i], FILTERS[j]));
            combination_operands.push(format!("{} {} any", FILTERS[i], FILTERS[j]));
            for k in j + 1..FILTERS.len() {
                combination_names
                    .push(format!("{}_{}_{}", FILTERS[i], FILTERS[j], FILTERS[k]));
                combination_operands
                    .push(format!("{} {} {}", FILTERS[i], FILTERS[j], FILTERS[k]));
            }
        }
    }
    for metric in METRICS {
        for (name, operands) in combination_names.iter().zip(&combination_operands) {
            let infix = if name.is_empty() { "" } else { "_" };
            define(
                globals,
                procedure(
                    format!("radar_{name}{infix}{metric}"),
                    format!("radar {operands} {metric}"),
                    None,
                    3,
                ),
            );
            define(
                globals,
                procedure(
                    format!("uradar_{name}{infix}{metric}"),
                    format!("uradar {operands} {metric} 0"),
                    None,
                    2,
                ),
            );
        }
    }
}

fn keyword(identifier: &str, value: Known) -> Definition {
    Definition::Keyword(Keyword {
        name: Name::built_in(identifier),
        value,
    })
}

fn procedure(
    identifier: impl Into<String>,
    instruction: impl Into<String>,
    dummy: Option<&str>,
    parameters: u32,
) -> Definition {
    Definition::BuiltinProcedure(BuiltinProcedure {
        name: Name::built_in(identifier),
        instruction: instruction.into(),
        dummy: dummy.map(str::to_owned),
        parameters,
    })
}

fn define(globals: &mut BTreeMap<String, Definition>, definition: Definition) {
    globals.insert(definition.name().identifier.clone(), definition);
}

/// Renders the listing of built-in keywords and constants, sorted by
/// identifier, with the device spelling after each one.
pub fn variable_listing(source: &Source) -> String {
    let mut listing = String::new();
    for definition in source.globals.values() {
        match definition {
            Definition::Keyword(keyword) => {
                let text = match keyword.value {
                    Known::False => "false",
                    Known::True => "true",
                    Known::Null => "null",
                    _ => continue,
                };
                let _ = writeln!(listing, "{:<28} # {text}", keyword.name.identifier);
            }
            Definition::BuiltinConstant(constant) => {
                let _ = writeln!(
                    listing,
                    "{:<28} # @{}",
                    constant.name.identifier, constant.property
                );
            }
            _ => {}
        }
    }
    listing
}

/// Renders the listing of built-in procedures, sorted by identifier,
/// with each call signature and the instruction it expands to.
pub fn procedure_listing(source: &Source) -> String {
    let mut listing = String::new();
    for definition in source.globals.values() {
        let Definition::BuiltinProcedure(procedure) = definition else {
            continue;
        };
        let mut call = String::new();
        call.push_str(&procedure.name.identifier);
        call.push('(');
        for parameter in 0..procedure.parameters {
            if parameter != 0 {
                call.push_str(", ");
            }
            let _ = write!(call, "a{parameter}");
        }
        call.push(')');
        let _ = write!(listing, "{call:<50} # {}", procedure.instruction);
        match &procedure.dummy {
            None => {
                for parameter in 0..procedure.parameters {
                    let _ = write!(listing, " a{parameter}");
                }
            }
            Some(dummy) => {
                let _ = write!(listing, " a0 {dummy}");
                for parameter in 1..procedure.parameters {
                    let _ = write!(listing, " a{parameter}");
                }
            }
        }
        listing.push('\n');
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_has_the_expected_population() {
        let source = built_in_source();
        let keywords = 3;
        let constants = PROPERTIES.len();
        let simple = PROCEDURES.len();
        let searches = 2 * METRICS.len() * (1 + 7 + 21 + 35);
        let locators = 3 + BUILDINGS.len();
        assert_eq!(
            source.globals.len(),
            keywords + constants + simple + searches + locators
        );
    }

    #[test]
    fn constants_use_underscored_identifiers() {
        let source = built_in_source();
        let Some(Definition::BuiltinConstant(constant)) =
            source.globals.get("additive_reconstructor")
        else {
            panic!("missing constant");
        };
        assert_eq!(constant.property, "additive-reconstructor");
    }

    #[test]
    fn search_families_enumerate_filters_in_order() {
        let source = built_in_source();
        let cases = [
            ("radar_distance", "radar any any any distance"),
            ("radar_enemy_health", "radar enemy any any health"),
            ("radar_enemy_ally_shield", "radar enemy ally any shield"),
            (
                "radar_player_attacker_flying_maxHealth",
                "radar player attacker flying maxHealth",
            ),
            ("uradar_boss_armor", "uradar boss any any armor 0"),
        ];
        for (identifier, instruction) in cases {
            let Some(Definition::BuiltinProcedure(procedure)) = source.globals.get(identifier)
            else {
                panic!("missing procedure `{identifier}`");
            };
            assert_eq!(procedure.instruction, instruction);
        }
    }

    #[test]
    fn building_locators_carry_a_dummy_argument() {
        let source = built_in_source();
        let Some(Definition::BuiltinProcedure(procedure)) =
            source.globals.get("ulocate_building_core")
        else {
            panic!("missing procedure");
        };
        assert_eq!(procedure.instruction, "ulocate building core");
        assert_eq!(procedure.dummy.as_deref(), Some("0"));
        assert_eq!(procedure.parameters, 5);
    }

    #[test]
    fn variable_listing_pads_identifiers_and_spells_the_device_name() {
        let source = built_in_source();
        let listing = variable_listing(&source);
        let first = listing.lines().next().expect("listing is not empty");
        assert_eq!(first, "additive_reconstructor       # @additive-reconstructor");
        assert!(listing.contains("\nfalse                        # false\n"));
    }

    #[test]
    fn procedure_listing_documents_signature_and_expansion() {
        let source = built_in_source();
        let listing = procedure_listing(&source);
        assert!(listing.contains("print(a0)"));
        assert!(
            listing
                .lines()
                .any(|line| line.starts_with("read(a0, a1, a2)") && line.ends_with("# read a0 a1 a2"))
        );
        assert!(listing.lines().any(|line| {
            line.starts_with("ulocate_building_core(a0, a1, a2, a3, a4)")
                && line.ends_with("# ulocate building core a0 0 a1 a2 a3 a4")
        }));
    }
}
