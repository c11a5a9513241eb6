//! Edge-triggered pulse capture.
//!
//! Two capture paths share the GPIO edge primitive:
//!
//! - **stream**: record every pulse length into the shared ring
//!   buffers and let the stream decoder learn the signal later. Used
//!   for unknown or marginal signals.
//! - **realtime**: a tight state machine keyed on the known sync
//!   pulses decodes bits directly between edges and lifts finished
//!   codes straight into the matrix. Also hosts the analyzer states
//!   and the pulse-length histogram.
//!
//! Both run on a dedicated thread elevated to realtime priority; the
//! edge handler allocates nothing and never logs between edges.

pub mod realtime;
pub mod ring;
pub mod stream;
