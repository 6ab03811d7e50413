//! Testes do subsistema de display.
//!
//! Tudo roda no host sobre os dublês de [`mock`]: o fake engine lê a tabela de
//! heads e os shadows da memória, como o hardware faria na fronteira de refresh.


mod buffer_test;
mod connector_test;
mod output_test;
