use alloy_sol_types::sol;

sol! {
    #[sol(rpc)]
    interface ILazyContentMinter {
        function isContentMinted(bytes32 contentId) external view returns (bool);
    }
}

sol! {
    #[derive(Debug)]
    event ContentRegistered(bytes32 indexed contentId, address indexed creator, uint256 price);

    #[derive(Debug)]
    event ContentMinted(bytes32 indexed contentId, address indexed minter);
}
