/// Liquid native asset id (L-BTC). Peg-ins of the native asset count as
/// touching this asset when a client tracks it.
pub const NATIVE_ASSET_ID: &str =
    "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d";

/// Donation invoice ids are fixed-width opaque handles.
pub const DONATION_ID_LEN: usize = 22;
