// Debug utilities - opt-in diagnostics for the fusion pipeline

pub mod pipeline_tracer;
