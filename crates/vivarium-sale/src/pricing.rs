// SPDX-License-Identifier: Apache-2.0
//! Pure pricing math for the Sale Pipeline (§4.H steps 1-2).

use vivarium_core::InventoryEntry;
use vivarium_serialize::Rgb;

use crate::config::SaleConfig;

/// Normalizing factor for [`Rgb::distance`]'s unbounded `sqrt(3)` range,
/// so `1.0 - normalized_distance` never goes negative.
const MAX_RGB_DISTANCE: f32 = 1.732_050_8;

/// A single priced tool, ready to fold into the pipeline's totals.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedTool {
    /// The entry's `SlimeId` (`"id"`/`"SlimeId"` attribute).
    pub slime_id: u64,
    /// The entry's `ToolUniqueId` (`"uid"` attribute), when carried.
    pub tool_uid: Option<u64>,
    /// `baseGross` before any multiplier.
    pub base_gross: f64,
    /// The color multiplier applied.
    pub color_mult: f64,
    /// `⌊max(minPayout, baseGross * standMult * colorMult)⌋`.
    pub payout: u64,
}

/// Nearest-palette-color multiplier: `(1 - normalizedDistance) ^ exponent`
/// against the closest color in `palette`. An empty palette or an entry
/// with no color attribute means no preference: `1.0`.
#[must_use]
pub fn color_multiplier(hex: Option<&str>, palette: &[Rgb], exponent: f64) -> f64 {
    if palette.is_empty() {
        return 1.0;
    }
    let Some(color) = hex.and_then(Rgb::from_hex) else {
        return 1.0;
    };
    let nearest = palette
        .iter()
        .map(|&p| color.distance(p))
        .fold(f32::INFINITY, f32::min);
    let normalized = f64::from((nearest / MAX_RGB_DISTANCE).clamp(0.0, 1.0));
    (1.0 - normalized).max(0.0).powf(exponent)
}

/// Price one captured-slime entry (§4.H step 2). Returns `None` if the
/// entry carries neither an `"id"` nor a `"SlimeId"` attribute — it isn't
/// a sellable entry at all.
#[must_use]
pub fn price_tool(entry: &InventoryEntry, stand_mult: f64, cfg: &SaleConfig) -> Option<PricedTool> {
    let slime_id = entry.resolve_id(vivarium_core::InventoryField::CapturedSlimes.id_key_candidates())?;
    let tool_uid = entry.get("uid").and_then(vivarium_core::AttrValue::as_u64);

    let growth = entry.get("gp").and_then(vivarium_core::AttrValue::as_f64).unwrap_or(0.0);
    let base_gross = entry
        .get("val")
        .and_then(vivarium_core::AttrValue::as_f64)
        .unwrap_or_else(|| cfg.value_base * (1.0 + cfg.value_per_growth * growth));

    let color_hex = entry.get("c1").and_then(vivarium_core::AttrValue::as_str);
    let color_mult = color_multiplier(color_hex, &cfg.palette, cfg.color_preference_exponent);

    let raw = (base_gross * stand_mult * color_mult).max(cfg.min_payout as f64);
    // Saturates rather than panics on an implausibly large gross value;
    // any sale at that magnitude is already a data anomaly elsewhere.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let payout = raw.floor().max(0.0) as u64;

    Some(PricedTool {
        slime_id,
        tool_uid,
        base_gross,
        color_mult,
        payout,
    })
}
