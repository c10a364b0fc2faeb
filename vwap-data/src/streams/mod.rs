/// Read-idle [`TimeoutStream`](timeout::TimeoutStream) wrapper used by the read loop.
pub mod timeout;
