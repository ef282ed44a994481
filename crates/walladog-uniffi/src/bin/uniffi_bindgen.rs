/// Custom uniffi-bindgen binary for generating language bindings.
///
/// Generates Kotlin/Swift bindings from the compiled walladog-uniffi cdylib.
///
/// Usage:
///   cargo run -p walladog-uniffi --features cli --bin walladog-uniffi-bindgen -- \
///     generate --library -l kotlin -o bindings/kotlin \
///     target/release/libwalladog_uniffi.so
fn main() {
    uniffi::uniffi_bindgen_main();
}
