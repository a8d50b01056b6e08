/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `produce` — HTTP-to-stream producer
- `consume` — Stream-to-index consumer

These handlers are intentionally small and wire together the library
components: configuration, credentials, the stream client, the indexer and
the HTTP boundary.
*/

pub mod consume;
pub mod produce;
