//! Tests for the VK API client.
