// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// pipeline works with: labelled driving samples, the fixed
// network input shape, and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A labelled (image reference, steering angle) pair
pub mod sample;

// Error taxonomy shared by every pipeline stage
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
