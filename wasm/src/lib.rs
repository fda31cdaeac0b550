use minesweeper_ai as ms;
use wasm_bindgen::prelude::*;

type Game = ms::Game<ms::KnowledgeEngine>;

#[wasm_bindgen]
pub fn create_game(height: u8, width: u8, mines: u8) -> Result<Vec<u8>, String> {
    console_error_panic_hook::set_once();

    let mut rng = rand::rng();
    let game = Game::new(height as usize, width as usize, mines as usize, &mut rng)
        .map_err(|e| e.to_string())?;
    game.serialize().map_err(|e| e.to_string())
}

#[wasm_bindgen]
pub fn is_won(bts: Vec<u8>) -> Result<bool, String> {
    console_error_panic_hook::set_once();

    let game = Game::deserialize(&bts).map_err(|e| e.to_string())?;
    Ok(game.game_state == ms::GameState::Won)
}

/// Reveals a cell chosen by the player. The last byte of the result is 0 if
/// the cell was safe and 1 if it was a mine.
#[wasm_bindgen]
pub fn reveal(bts: Vec<u8>, row: usize, col: usize) -> Result<Vec<u8>, String> {
    console_error_panic_hook::set_once();

    let mut game = Game::deserialize(&bts).map_err(|e| e.to_string())?;
    let safe = game
        .reveal(ms::Cell::new(row, col))
        .map_err(|e| e.to_string())?;
    let mut xs = game.serialize().map_err(|e| e.to_string())?;
    xs.push(if safe { 0 } else { 1 });
    Ok(xs)
}

/// Lets the agent make one move.
#[wasm_bindgen]
pub fn agent_step(bts: Vec<u8>) -> Result<Vec<u8>, String> {
    console_error_panic_hook::set_once();

    let mut game = Game::deserialize(&bts).map_err(|e| e.to_string())?;
    let mut rng = rand::rng();
    game.step(&mut rng).map_err(|e| e.to_string())?;
    game.serialize().map_err(|e| e.to_string())
}

/// Row-major tiles: -1 hidden, -2 flagged, otherwise the revealed count.
#[wasm_bindgen]
pub fn get_cells(bts: Vec<u8>) -> Result<Vec<i8>, String> {
    console_error_panic_hook::set_once();

    let game = Game::deserialize(&bts).map_err(|e| e.to_string())?;
    Ok(game
        .board
        .into_iter()
        .flat_map(|row| {
            row.into_iter().map(|tile| match tile {
                ms::Tile::Hidden => -1,
                ms::Tile::Flagged => -2,
                ms::Tile::Revealed(n) => n as i8,
            })
        })
        .collect())
}
